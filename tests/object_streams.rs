//! Wire-level scenarios over hand-built streams.

mod common;

use std::rc::Rc;

use common::{StreamBuilder, BASE};
use java_read::{ArrayData, Error, ObjectReader, Value};

fn reader_over(bytes: &[u8]) -> ObjectReader<&[u8]> {
    ObjectReader::new(bytes).expect("header must parse")
}

#[test]
fn header_mismatch_is_rejected() {
    let bytes = [0xACu8, 0xED, 0x00, 0x06];
    assert!(
        matches!(ObjectReader::new(&bytes[..]), Err(Error::StreamCorrupted(_))),
        "wrong stream version must be rejected"
    );

    let bytes = [0xCAu8, 0xFE, 0x00, 0x05];
    assert!(matches!(
        ObjectReader::new(&bytes[..]),
        Err(Error::StreamCorrupted(_))
    ));
}

#[test]
fn short_string() {
    let bytes = StreamBuilder::new().string("hello").finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    assert_eq!(value.as_str(), Some("hello"));
}

#[test]
fn long_string() {
    let bytes = StreamBuilder::new()
        .byte(0x7C)
        .u64(5)
        .bytes(b"world")
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    assert_eq!(value.as_str(), Some("world"));
}

#[test]
fn backreference_aliases_the_same_string() {
    let bytes = StreamBuilder::new()
        .string("hi")
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    let first = reader.read_object().expect("must read");
    let second = reader.read_object().expect("must read");
    assert_eq!(first.as_str(), Some("hi"));
    assert!(
        first.same_identity(&second),
        "back-reference must alias the registered value"
    );
}

#[test]
fn null_item() {
    let bytes = StreamBuilder::new().byte(0x70).finish();
    let mut reader = reader_over(&bytes);
    assert!(reader.read_object().expect("must read").is_null());
}

#[test]
fn int_array() {
    // the exact wire bytes of `new int[] {1, 2, 3}`
    let bytes = StreamBuilder::new()
        .bytes(&[
            0x75, 0x72, 0x00, 0x02, 0x5B, 0x49, 0x4D, 0xBA, 0x60, 0x26, 0x76, 0xEA, 0xB2, 0xA5,
            0x02, 0x00, 0x00, 0x78, 0x70, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03,
        ])
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    let arr = value.as_array().expect("must be an array");
    assert_eq!(arr.desc().name(), "[I");
    assert!(
        matches!(&*arr.elements(), ArrayData::Ints(v) if *v == vec![1, 2, 3]),
        "expected [1, 2, 3], got {:?}",
        arr.elements()
    );
}

#[test]
fn reference_array_with_nulls() {
    let bytes = StreamBuilder::new()
        .byte(0x75)
        .plain_desc("[Ljava.lang.Object;", 0x2BCD, 0x02, &[])
        .i32(2)
        .string("x")
        .byte(0x70)
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    let arr = value.as_array().expect("must be an array");
    let elements = arr.elements();
    let ArrayData::Refs(refs) = &*elements else {
        panic!("expected reference elements, got {elements:?}");
    };
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].as_str(), Some("x"));
    assert!(refs[1].is_null());
}

#[test]
fn array_component_must_be_known() {
    let bytes = StreamBuilder::new()
        .byte(0x75)
        .plain_desc("[Q", 1, 0x02, &[])
        .i32(0)
        .finish();
    let mut reader = reader_over(&bytes);
    assert!(
        matches!(reader.read_object(), Err(Error::InvalidClass { .. })),
        "unknown primitive component type must be rejected"
    );
}

#[test]
fn reset_then_null_restarts_the_handle_counter() {
    let bytes = StreamBuilder::new()
        .byte(0x79)
        .byte(0x70)
        .string("a")
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    assert!(
        reader.read_object().expect("must read").is_null(),
        "reset is consumed and the following null returned"
    );

    let a = reader.read_object().expect("must read");
    let again = reader.read_object().expect("must read");
    assert!(
        a.same_identity(&again),
        "string after reset must sit at the base handle"
    );
}

#[test]
fn reset_invalidates_prior_handles() {
    let bytes = StreamBuilder::new()
        .string("old")
        .byte(0x79)
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    reader.read_object().expect("must read");
    assert!(
        matches!(reader.read_object(), Err(Error::StreamCorrupted(_))),
        "pre-reset handles must be gone after the reset"
    );
}

#[test]
fn handles_assign_in_first_appearance_order() {
    let bytes = StreamBuilder::new()
        .string("a")
        .string("b")
        .string("c")
        .reference(BASE + 1)
        .reference(BASE)
        .reference(BASE + 2)
        .finish();
    let mut reader = reader_over(&bytes);

    let a = reader.read_object().expect("a");
    let b = reader.read_object().expect("b");
    let c = reader.read_object().expect("c");
    assert!(reader.read_object().expect("ref b").same_identity(&b));
    assert!(reader.read_object().expect("ref a").same_identity(&a));
    assert!(reader.read_object().expect("ref c").same_identity(&c));
}

#[test]
fn unshared_item_refuses_backreference() {
    let bytes = StreamBuilder::new()
        .string("secret")
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_unshared().expect("must read");
    assert_eq!(value.as_str(), Some("secret"));
    assert!(
        matches!(reader.read_object(), Err(Error::InvalidObject(_))),
        "back-reference to an unshared item must fail"
    );
}

#[test]
fn unshared_read_of_a_backreference_fails() {
    let bytes = StreamBuilder::new()
        .string("shared")
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    reader.read_object().expect("must read");
    assert!(matches!(
        reader.read_unshared(),
        Err(Error::InvalidObject(_))
    ));
}

#[test]
fn object_with_default_fields() {
    let bytes = StreamBuilder::new()
        .byte(0x73)
        .plain_desc(
            "com.example.Point",
            0x1234,
            0x02,
            &[(b'I', "x"), (b'I', "y"), (b'L', "label")],
        )
        .i32(1)
        .i32(2)
        .string("pt")
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    let obj = value.as_object().expect("must be an object");
    assert_eq!(obj.desc().name(), "com.example.Point");
    assert_eq!(
        obj.field("x").and_then(|f| f.as_prim()),
        Some(java_read::PrimValue::Int(1))
    );
    assert_eq!(
        obj.field("y").and_then(|f| f.as_prim()),
        Some(java_read::PrimValue::Int(2))
    );
    let label = obj.field("label").expect("label present");
    assert_eq!(label.as_ref_value().and_then(Value::as_str), Some("pt"));
}

#[test]
fn cyclic_object_resolves_to_itself() {
    // desc = BASE, signature string = BASE + 1, object = BASE + 2
    let bytes = StreamBuilder::new()
        .byte(0x73)
        .plain_desc("Node", 7, 0x02, &[(b'L', "next")])
        .reference(BASE + 2)
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("must read");
    let obj = value.as_object().expect("must be an object");
    let next = obj.field("next").expect("next present");
    assert!(
        next.as_ref_value().expect("reference").same_identity(&value),
        "self-referential field must alias the object being read"
    );
}

#[test]
fn sibling_objects_share_one_descriptor() {
    let bytes = StreamBuilder::new()
        .byte(0x73)
        .plain_desc("Pair", 9, 0x02, &[(b'I', "v")])
        .i32(1)
        .byte(0x73)
        .reference(BASE)
        .i32(2)
        .finish();
    let mut reader = reader_over(&bytes);

    let first = reader.read_object().expect("first");
    let second = reader.read_object().expect("second");
    let first = first.as_object().expect("object");
    let second = second.as_object().expect("object");
    assert!(
        Rc::ptr_eq(first.desc(), second.desc()),
        "descriptor back-reference must alias the parsed descriptor"
    );
    assert_eq!(
        second.field("v").and_then(|f| f.as_prim()),
        Some(java_read::PrimValue::Int(2))
    );
}

#[test]
fn class_literal_registers_a_handle() {
    let bytes = StreamBuilder::new()
        .byte(0x76)
        .plain_desc("com.example.Widget", 3, 0x02, &[])
        .reference(BASE + 1)
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("class literal");
    let class = value.as_class().expect("must be a class");
    assert_eq!(class.name(), "com.example.Widget");

    let again = reader.read_object().expect("back-reference");
    assert!(value.same_identity(&again));
}

#[test]
fn primitive_class_literal() {
    let bytes = StreamBuilder::new()
        .byte(0x76)
        .plain_desc("int", 0, 0x02, &[])
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("class literal");
    let class = value.as_class().expect("must be a class");
    assert_eq!(class.as_primitive(), Some(java_read::Primitive::Int));
}

#[test]
fn enum_constants_share_identity() {
    let enum_flags = 0x12; // SC_SERIALIZABLE | SC_ENUM
    let bytes = StreamBuilder::new()
        // first constant: full descriptor chain, then the name
        .byte(0x7E)
        .open_desc("com.example.Color", 0, enum_flags, &[])
        .byte(0x78)
        .open_desc("java.lang.Enum", 0, enum_flags, &[])
        .byte(0x78)
        .byte(0x70)
        .string("RED")
        // second constant: descriptor and name as back-references
        .byte(0x7E)
        .reference(BASE)
        .reference(BASE + 3)
        .finish();
    let mut reader = reader_over(&bytes);

    let first = reader.read_object().expect("first constant");
    let second = reader.read_object().expect("second constant");
    let e = first.as_enum().expect("must be an enum");
    assert_eq!(e.desc().name(), "com.example.Color");
    assert_eq!(e.constant(), "RED");
    assert!(
        first.same_identity(&second),
        "the same constant must resolve to one singleton"
    );
}

#[test]
fn enum_descriptor_uid_must_be_zero() {
    let enum_flags = 0x12;
    let bytes = StreamBuilder::new()
        .byte(0x7E)
        .plain_desc("com.example.Bad", 5, enum_flags, &[])
        .string("RED")
        .finish();
    let mut reader = reader_over(&bytes);
    assert!(matches!(
        reader.read_object(),
        Err(Error::InvalidClass { .. })
    ));
}

#[test]
fn proxy_descriptor_object() {
    let bytes = StreamBuilder::new()
        .byte(0x73)
        .byte(0x7D)
        .u32(1)
        .utf("com.example.Marker")
        .byte(0x78)
        .byte(0x70)
        .finish();
    let mut reader = reader_over(&bytes);

    let value = reader.read_object().expect("proxy object");
    let obj = value.as_object().expect("must be an object");
    assert!(obj.desc().is_proxy());
    assert_eq!(obj.desc().interfaces(), ["com.example.Marker".to_owned()]);
}

#[test]
fn write_aborted_carries_the_throwable_and_clears_handles() {
    let bytes = StreamBuilder::new()
        .byte(0x7B)
        .byte(0x73)
        .plain_desc("com.example.Boom", 1, 0x02, &[])
        // the table was cleared around the capture, so this handle is gone
        .reference(BASE)
        .finish();
    let mut reader = reader_over(&bytes);

    let err = reader.read_object().expect_err("must abort");
    let Error::WriteAborted(cause) = err else {
        panic!("expected WriteAborted, got {err:?}");
    };
    assert_eq!(
        cause.as_object().expect("throwable").desc().name(),
        "com.example.Boom"
    );

    assert!(
        matches!(reader.read_object(), Err(Error::StreamCorrupted(_))),
        "handle table must be empty after the capture"
    );
}

#[test]
fn block_data_feeds_primitive_reads() {
    let bytes = StreamBuilder::new()
        .byte(0x77)
        .byte(0x04)
        .i32(42)
        .byte(0x70)
        .finish();
    let mut reader = reader_over(&bytes);

    assert_eq!(reader.available().expect("available"), 4);
    // locality: available must not have advanced past primitive data
    assert_eq!(reader.available().expect("available"), 4);
    assert_eq!(reader.read_i32().expect("must read"), 42);
    assert!(reader.read_object().expect("object mode").is_null());
}

#[test]
fn primitive_reads_span_frames() {
    let bytes = StreamBuilder::new()
        .byte(0x77)
        .byte(0x02)
        .bytes(&[0x00, 0x00])
        .byte(0x77)
        .byte(0x02)
        .bytes(&[0x00, 0x2A])
        .finish();
    let mut reader = reader_over(&bytes);
    assert_eq!(
        reader.read_i32().expect("must span two frames"),
        42
    );
}

#[test]
fn long_block_data_frame() {
    let payload = [7u8; 300];
    let bytes = StreamBuilder::new()
        .byte(0x7A)
        .u32(300)
        .bytes(&payload)
        .finish();
    let mut reader = reader_over(&bytes);

    assert_eq!(reader.available().expect("available"), 300);
    let mut buf = [0u8; 300];
    reader.read_fully(&mut buf).expect("must read");
    assert_eq!(buf, payload);
}

#[test]
fn pending_block_data_blocks_object_reads() {
    let bytes = StreamBuilder::new()
        .byte(0x77)
        .byte(0x02)
        .u16(0xABCD)
        .byte(0x70)
        .finish();
    let mut reader = reader_over(&bytes);

    let err = reader.read_object().expect_err("primitive data is pending");
    assert!(
        matches!(err, Error::OptionalData { remaining: 2, at_end: false }),
        "expected OptionalData with 2 bytes, got {err:?}"
    );

    assert_eq!(reader.read_u16().expect("must read"), 0xABCD);
    assert!(reader.read_object().expect("must read").is_null());
}

#[test]
fn primitive_read_without_data_hits_eof() {
    let bytes = StreamBuilder::new().byte(0x70).finish();
    let mut reader = reader_over(&bytes);

    let err = reader.read_i32().expect_err("no primitive data");
    assert!(
        matches!(&err, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof),
        "expected eof, got {err:?}"
    );
    assert!(
        reader.read_object().expect("object still readable").is_null(),
        "the object token must have been pushed back"
    );
}

#[test]
fn reset_inside_primitive_refill() {
    let bytes = StreamBuilder::new()
        .string("gone")
        .byte(0x79)
        .byte(0x77)
        .byte(0x01)
        .byte(0x2A)
        .finish();
    let mut reader = reader_over(&bytes);

    reader.read_object().expect("string");
    assert_eq!(reader.read_u8().expect("refill skips the reset"), 0x2A);
}

#[test]
fn skip_and_read_line() {
    let bytes = StreamBuilder::new()
        .byte(0x77)
        .byte(0x0B)
        .bytes(b"ab\r\nline two")
        .finish();
    let mut reader = reader_over(&bytes);

    // frame holds 11 bytes: "ab\r\nline tw"
    assert_eq!(reader.read_line().expect("line"), Some("ab".to_owned()));
    assert_eq!(
        reader.read_line().expect("line"),
        Some("line tw".to_owned()),
        "line is cut at the end of primitive data"
    );
    assert_eq!(reader.read_line().expect("line"), None);
}

#[test]
fn skip_stops_at_object_boundary() {
    let bytes = StreamBuilder::new()
        .byte(0x77)
        .byte(0x03)
        .bytes(&[1, 2, 3])
        .byte(0x70)
        .finish();
    let mut reader = reader_over(&bytes);

    assert_eq!(reader.skip(10).expect("skip"), 3, "only frame bytes skip");
    assert!(reader.read_object().expect("must read").is_null());
}

#[test]
fn malformed_string_data() {
    let bytes = StreamBuilder::new()
        .byte(0x74)
        .u16(3)
        .bytes(&[0xED, 0xA0, 0xBD])
        .finish();
    let mut reader = reader_over(&bytes);
    assert!(matches!(reader.read_object(), Err(Error::MalformedUtf8)));
}

#[test]
fn unknown_token_is_corrupt() {
    let bytes = StreamBuilder::new().byte(0x42).finish();
    let mut reader = reader_over(&bytes);
    assert!(matches!(
        reader.read_object(),
        Err(Error::StreamCorrupted(_))
    ));
}

#[test]
fn truncated_stream_is_eof() {
    let bytes = StreamBuilder::new().byte(0x74).u16(10).bytes(b"abc").finish();
    let mut reader = reader_over(&bytes);
    let err = reader.read_object().expect_err("truncated");
    assert!(
        matches!(&err, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof),
        "expected eof, got {err:?}"
    );
}
