use netser::{NameTable, Object, Poly, SerDes, Serializable, TypeRef};
use std::collections::{HashMap, HashSet, LinkedList};

#[derive(Serializable, Debug, PartialEq)]
struct WithPrimitives {
    p1: i32,
    p2: f64,
    text: Option<String>,
}

impl WithPrimitives {
    fn new() -> Self {
        Self {
            p1: 1234,
            p2: 0.51,
            text: Some("Hello World".to_string()),
        }
    }
}

#[derive(Serializable, Debug, PartialEq)]
struct SubClass {
    #[netser(extends)]
    base: WithPrimitives,
    some_long: i64,
}

impl SubClass {
    fn new() -> Self {
        Self {
            base: WithPrimitives::new(),
            some_long: 837473546345,
        }
    }
}

#[derive(Serializable, Debug, PartialEq)]
struct Composed {
    child: Option<Poly<WithPrimitives>>,
}

#[derive(Serializable, Debug, PartialEq)]
struct BoxedPrimitive {
    i: Option<i32>,
}

#[derive(Serializable, Debug, PartialEq)]
struct ListAndSet {
    l1: Vec<i32>,
    l2: LinkedList<Poly<WithPrimitives>>,
    l3: HashSet<Option<String>>,
}

impl ListAndSet {
    fn new() -> Self {
        let mut l2 = LinkedList::new();
        l2.push_back(Poly::new(WithPrimitives::new()));
        l2.push_back(Poly::new(SubClass::new()));
        Self {
            l1: vec![1, 2, 3, 9, 3, 2, 7],
            l2,
            l3: [
                Some("Derp"),
                Some("Herp"),
                Some("Hello World"),
                None,
                Some("There was a null"),
            ]
            .into_iter()
            .map(|s| s.map(str::to_string))
            .collect(),
        }
    }
}

#[derive(Serializable, Debug, PartialEq)]
struct WithMap {
    map: HashMap<Option<i32>, Option<String>>,
}

#[derive(Serializable, Debug, PartialEq)]
struct FinalField {
    #[netser(immutable)]
    i1: i32,
    #[netser(immutable)]
    i2: i32,
    #[netser(constant = "abc")]
    text: String,
}

impl FinalField {
    fn new() -> Self {
        Self::with(99, 3)
    }

    fn with(i1: i32, i2: i32) -> Self {
        Self {
            i1,
            i2,
            text: "abc".to_string(),
        }
    }
}

fn serdes() -> SerDes {
    SerDes::builder()
        .register::<WithPrimitives>()
        .register::<SubClass>()
        .register::<Composed>()
        .register::<BoxedPrimitive>()
        .register::<ListAndSet>()
        .register::<WithMap>()
        .register::<FinalField>()
        .build()
        .unwrap()
}

fn round_trip<T: netser::Encoder + netser::Decoder>(serdes: &SerDes, value: &T) -> T {
    let mut sink = Vec::new();
    serdes.write_value(value, &mut sink).unwrap();
    serdes.read_value(&mut sink.as_slice()).unwrap()
}

#[test]
fn test_primitives() {
    let serdes = serdes();
    let original = WithPrimitives::new();
    assert_eq!(round_trip(&serdes, &original), original);
}

#[test]
fn test_primitives_with_null_text() {
    let serdes = serdes();
    let original = WithPrimitives {
        p1: -7,
        p2: f64::MAX,
        text: None,
    };
    assert_eq!(round_trip(&serdes, &original), original);
}

#[test]
fn test_subclass_keeps_inherited_fields() {
    let serdes = serdes();
    let original = SubClass::new();
    let decoded = round_trip(&serdes, &original);
    assert_eq!(decoded, original);
    assert_eq!(decoded.base.p1, 1234);
    assert_eq!(decoded.base.p2, 0.51);
    assert_eq!(decoded.base.text.as_deref(), Some("Hello World"));
    assert_eq!(decoded.some_long, 837473546345);
}

#[test]
fn test_composed_keeps_runtime_type() {
    let serdes = serdes();
    let original = Composed {
        child: Some(Poly::new(SubClass::new())),
    };
    let decoded = round_trip(&serdes, &original);
    assert_eq!(decoded, original);

    let child = decoded.child.as_ref().unwrap();
    assert!(child.is::<SubClass>());
    assert!(!child.is::<WithPrimitives>());
    assert_eq!(child.downcast_ref::<SubClass>().unwrap(), &SubClass::new());
}

#[test]
fn test_composed_with_base_instance_and_null() {
    let serdes = serdes();
    let base = Composed {
        child: Some(Poly::new(WithPrimitives::new())),
    };
    assert_eq!(round_trip(&serdes, &base), base);

    let empty = Composed { child: None };
    assert_eq!(round_trip(&serdes, &empty), empty);
}

#[test]
fn test_boxed_primitive() {
    let serdes = serdes();
    for original in [
        BoxedPrimitive { i: Some(99) },
        BoxedPrimitive { i: Some(123) },
        BoxedPrimitive { i: None },
    ] {
        assert_eq!(round_trip(&serdes, &original), original);
    }
}

#[test]
fn test_list_and_set() {
    let serdes = serdes();
    let original = ListAndSet::new();
    let decoded = round_trip(&serdes, &original);
    assert_eq!(decoded, original);
    assert_eq!(decoded.l1, vec![1, 2, 3, 9, 3, 2, 7]);
    assert!(decoded.l3.contains(&None));
    assert!(decoded.l2.back().unwrap().is::<SubClass>());
}

#[test]
fn test_map_with_null_key() {
    let serdes = serdes();
    let mut map = HashMap::new();
    map.insert(Some(0), Some("Derp".to_string()));
    map.insert(Some(1), Some("Bla".to_string()));
    map.insert(None, Some("Something".to_string()));
    let original = WithMap { map };

    let decoded = round_trip(&serdes, &original);
    assert_eq!(decoded, original);
    assert_eq!(decoded.map[&None].as_deref(), Some("Something"));
}

#[test]
fn test_final_fields() {
    let serdes = serdes();
    for original in [FinalField::new(), FinalField::with(5, 87)] {
        let decoded = round_trip(&serdes, &original);
        assert_eq!(decoded, original);
        assert_eq!(decoded.text, "abc");
    }
    let decoded = round_trip(&serdes, &FinalField::with(5, 87));
    assert_eq!((decoded.i1, decoded.i2), (5, 87));
}

#[test]
fn test_constant_field_is_not_written() {
    let serdes = serdes();
    let bytes = serdes.encode(&FinalField::with(5, 87)).unwrap();
    // object tag + two tagged i32 values, nothing for the constant
    assert_eq!(bytes.len(), 1 + 5 + 5);
    assert!(!bytes.windows(3).any(|w| w == b"abc"));
}

#[test]
fn test_type_literal() {
    let serdes = serdes();
    let decoded: TypeRef = round_trip(&serdes, &TypeRef::of::<String>());
    assert_eq!(decoded, TypeRef::text());

    let registered: TypeRef = round_trip(&serdes, &TypeRef::of::<SubClass>());
    assert_eq!(registered, TypeRef::of::<SubClass>());
}

#[test]
fn test_named_type_literal_resolves() {
    let serdes = SerDes::builder()
        .register::<WithPrimitives>()
        .resolver(
            NameTable::new()
                .with("java.lang.String", TypeRef::text())
                .with_type::<WithPrimitives>(),
        )
        .build()
        .unwrap();

    let text: TypeRef = round_trip(&serdes, &TypeRef::Named("java.lang.String".to_string()));
    assert_eq!(text, TypeRef::text());

    let registered: TypeRef = round_trip(&serdes, &TypeRef::Named("WithPrimitives".to_string()));
    assert_eq!(registered, TypeRef::of::<WithPrimitives>());
}

#[test]
fn test_null() {
    let serdes = serdes();
    let bytes = serdes.encode(&Option::<Box<dyn Object>>::None).unwrap();
    assert_eq!(&bytes[..], &[netser::TAG_NULL]);
    let decoded: Option<Box<dyn Object>> = serdes.decode(&bytes).unwrap();
    assert!(decoded.is_none());
}

#[test]
fn test_dyn_object_round_trip() {
    let serdes = serdes();
    let original: Box<dyn Object> = Box::new(SubClass::new());
    let decoded: Box<dyn Object> = round_trip(&serdes, &original);
    assert_eq!(decoded.type_name(), "SubClass");
    assert!(decoded.as_ref() == original.as_ref());
    let sub = netser::model::downcast_box::<SubClass>(decoded).unwrap();
    assert_eq!(sub, SubClass::new());
}

#[test]
fn test_runtime_id_is_written() {
    let serdes = serdes();
    let base = serdes.encode(&WithPrimitives::new()).unwrap();
    let sub = serdes.encode(&SubClass::new()).unwrap();
    assert_eq!(base[0], netser::TAG_OBJECT_BASE);
    assert_eq!(sub[0], netser::TAG_OBJECT_BASE + 1);
    // inherited fields come first, byte for byte
    assert_eq!(&sub[1..base.len()], &base[1..]);
    assert_eq!(sub[base.len()], netser::TAG_I64);
}

#[test]
fn test_several_values_in_one_stream() {
    let serdes = serdes();
    let mut sink = Vec::new();
    serdes.write_value(&WithPrimitives::new(), &mut sink).unwrap();
    serdes.write_value(&BoxedPrimitive { i: None }, &mut sink).unwrap();
    serdes.write_value(&"tail".to_string(), &mut sink).unwrap();

    let mut source = sink.as_slice();
    let first: WithPrimitives = serdes.read_value(&mut source).unwrap();
    let second: BoxedPrimitive = serdes.read_value(&mut source).unwrap();
    let third: String = serdes.read_value(&mut source).unwrap();
    assert_eq!(first, WithPrimitives::new());
    assert_eq!(second, BoxedPrimitive { i: None });
    assert_eq!(third, "tail");
    assert!(source.is_empty());
}
