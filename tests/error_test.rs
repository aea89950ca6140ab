use netser::*;
use std::io::{self, Read, Write};

#[derive(Serializable, Debug, PartialEq)]
struct Base {
    id: u32,
}

#[derive(Serializable, Debug, PartialEq)]
struct Derived {
    #[netser(extends)]
    base: Base,
    label: String,
}

#[derive(Serializable, Debug, PartialEq)]
struct Holder {
    item: Option<Poly<Base>>,
}

#[derive(Serializable, Debug, PartialEq)]
struct DerivedHolder {
    item: Option<Poly<Derived>>,
}

#[derive(Serializable, Debug, PartialEq)]
struct BaseByValue {
    item: Option<Base>,
    all: Vec<Base>,
}

#[derive(Serializable, Debug, PartialEq)]
struct Stranger {
    x: i8,
}

fn serdes() -> SerDes {
    SerDes::builder()
        .register::<Base>()
        .register::<Derived>()
        .register::<Holder>()
        .register::<DerivedHolder>()
        .build()
        .unwrap()
}

#[test]
fn test_unregistered_type() {
    let serdes = serdes();
    let mut sink = Vec::new();
    let result = serdes.write_value(&Stranger { x: 1 }, &mut sink);
    assert!(matches!(
        result,
        Err(SerDesError::UnregisteredType {
            type_name: "Stranger"
        })
    ));
    assert!(sink.is_empty());
}

#[test]
fn test_unregistered_nested_type() {
    let serdes = serdes();
    let list: Vec<Box<dyn Object>> = vec![Box::new(Base { id: 1 }), Box::new(Stranger { x: 2 })];
    let mut sink = Vec::new();
    assert!(matches!(
        serdes.write_value(&list, &mut sink),
        Err(SerDesError::UnregisteredType { .. })
    ));
    assert!(sink.is_empty());

    let holder = Holder {
        item: Some(Poly::new(Stranger { x: 3 })),
    };
    assert!(matches!(
        serdes.encode(&holder),
        Err(SerDesError::UnregisteredType {
            type_name: "Stranger"
        })
    ));
}

#[test]
fn test_poly_rejects_unrelated_type() {
    let serdes = serdes();
    let holder = DerivedHolder {
        item: Some(Poly::new(Base { id: 1 })),
    };
    assert!(matches!(
        serdes.encode(&holder),
        Err(SerDesError::TypeMismatch { .. })
    ));

    // a Holder payload carrying a plain Base, decoded as a DerivedHolder
    let bytes = serdes
        .encode(&Holder {
            item: Some(Poly::new(Base { id: 1 })),
        })
        .unwrap();
    let mut retagged = bytes.to_vec();
    retagged[0] = TAG_OBJECT_BASE + 3;
    assert!(matches!(
        serdes.decode::<DerivedHolder>(&retagged),
        Err(SerDesError::TypeMismatch { .. })
    ));
}

#[test]
fn test_concrete_type_mismatch() {
    let serdes = serdes();
    let bytes = serdes.encode(&Base { id: 5 }).unwrap();
    assert!(matches!(
        serdes.decode::<Derived>(&bytes),
        Err(SerDesError::TypeMismatch { .. })
    ));
    assert!(matches!(
        serdes.decode::<String>(&bytes),
        Err(SerDesError::TypeMismatch { .. })
    ));
}

#[test]
fn test_primitive_type_mismatch() {
    let serdes = serdes();
    let bytes = serdes.encode(&7i32).unwrap();
    assert!(matches!(
        serdes.decode::<i64>(&bytes),
        Err(SerDesError::TypeMismatch { .. })
    ));
    assert!(matches!(
        serdes.decode::<Vec<i32>>(&bytes),
        Err(SerDesError::TypeMismatch { .. })
    ));
}

#[test]
fn test_unknown_type_id() {
    let serdes = serdes();
    assert!(matches!(
        serdes.decode::<Box<dyn Object>>(&[TAG_OBJECT_BASE + 9]),
        Err(SerDesError::UnknownTypeId(9))
    ));
    assert!(matches!(
        serdes.decode::<Box<dyn Object>>(&[TAG_OBJECT_LONG, LEN_U16, 0x00, 0x01]),
        Err(SerDesError::UnknownTypeId(256))
    ));
    assert!(matches!(
        serdes.decode::<Value>(&[0x16]),
        Err(SerDesError::UnknownTypeId(0x16))
    ));
    assert!(matches!(
        serdes.decode::<TypeRef>(&[TAG_TYPE_REGISTERED, 40]),
        Err(SerDesError::UnknownTypeId(40))
    ));
}

#[test]
fn test_truncated_stream() {
    let serdes = serdes();
    let bytes = serdes
        .encode(&Derived {
            base: Base { id: 1 },
            label: "truncate me".to_string(),
        })
        .unwrap();
    for cut in [0, 1, 3, bytes.len() - 1] {
        assert!(
            matches!(
                serdes.decode::<Derived>(&bytes[..cut]),
                Err(SerDesError::TruncatedStream)
            ),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_duplicate_registration() {
    let result = SerDes::builder()
        .register::<Base>()
        .register::<Base>()
        .build();
    assert!(matches!(
        result,
        Err(SerDesError::DuplicateType { type_name: "Base" })
    ));
}

#[test]
fn test_unsupported_nested_field() {
    let result = SerDes::builder().register::<Holder>().build();
    assert!(matches!(
        result,
        Err(SerDesError::UnsupportedField {
            type_name: "Holder",
            field: "item",
            ..
        })
    ));

    // registering a descendant is enough to accept the declared base
    assert!(SerDes::builder()
        .register::<Derived>()
        .register::<Holder>()
        .build()
        .is_ok());
}

#[test]
fn test_by_value_field_needs_exact_registration() {
    // a registered descendant does not make the base itself encodable
    let result = SerDes::builder()
        .register::<Derived>()
        .register::<BaseByValue>()
        .build();
    assert!(matches!(
        result,
        Err(SerDesError::UnsupportedField {
            type_name: "BaseByValue",
            field: "item",
            ..
        })
    ));

    let serdes = SerDes::builder()
        .register::<Base>()
        .register::<BaseByValue>()
        .build()
        .unwrap();
    let value = BaseByValue {
        item: Some(Base { id: 3 }),
        all: vec![Base { id: 4 }],
    };
    let decoded: BaseByValue = serdes.decode(&serdes.encode(&value).unwrap()).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_named_type_without_resolver() {
    let serdes = serdes();
    let bytes = serdes.encode(&TypeRef::Named("Nope".to_string())).unwrap();
    assert!(matches!(
        serdes.decode::<TypeRef>(&bytes),
        Err(SerDesError::NameNotFound(name)) if name == "Nope"
    ));

    let with_table = SerDes::builder().resolver(NameTable::new()).build().unwrap();
    assert!(matches!(
        with_table.decode::<TypeRef>(&bytes),
        Err(SerDesError::NameNotFound(_))
    ));
}

#[test]
fn test_unregistered_type_literal() {
    let serdes = serdes();
    assert!(matches!(
        serdes.encode(&TypeRef::of::<Stranger>()),
        Err(SerDesError::UnregisteredType { .. })
    ));
}

#[test]
fn test_depth_limit() {
    let serdes = SerDes::builder().max_depth(2).build().unwrap();
    let bytes = serdes.encode(&vec![vec![vec![1i32]]]).unwrap();
    assert!(matches!(
        serdes.decode::<Vec<Vec<Vec<i32>>>>(&bytes),
        Err(SerDesError::DepthLimitExceeded { limit: 2 })
    ));
    let shallow: Vec<Vec<i32>> = serdes.decode(&serdes.encode(&vec![vec![1i32]]).unwrap()).unwrap();
    assert_eq!(shallow, vec![vec![1]]);
}

#[test]
fn test_invalid_payloads() {
    let serdes = serdes();
    assert!(matches!(
        serdes.decode::<String>(&[TAG_STRING, 1, 0xFF]),
        Err(SerDesError::InvalidData(_))
    ));
    assert!(matches!(
        serdes.decode::<char>(&[TAG_CHAR, 0x00, 0xD8, 0x00, 0x00]),
        Err(SerDesError::InvalidData(_))
    ));
    assert!(matches!(
        serdes.decode::<TypeRef>(&[TAG_TYPE_BUILTIN, 200]),
        Err(SerDesError::InvalidData(_))
    ));
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenSource;

impl Read for BrokenSource {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
    }
}

#[test]
fn test_io_errors_pass_through() {
    let serdes = serdes();
    match serdes.write_value(&1u8, &mut BrokenSink) {
        Err(SerDesError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected result: {:?}", other),
    }
    match serdes.read_value::<u8, _>(&mut BrokenSource) {
        Err(SerDesError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("unexpected result: {:?}", other),
    }
}
