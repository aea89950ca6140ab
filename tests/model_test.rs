use netser::*;
use std::any::TypeId;
use std::sync::Arc;
use std::thread;

#[derive(Serializable, Debug, PartialEq)]
struct Animal {
    name: String,
    legs: u8,
}

#[derive(Serializable, Debug, PartialEq)]
struct Dog {
    #[netser(extends)]
    animal: Animal,
    #[netser(immutable)]
    chip: u64,
    #[netser(constant = "woof")]
    sound: String,
    #[netser(skip)]
    cache: Vec<u8>,
}

#[derive(Serializable, Debug, PartialEq)]
struct Puppy {
    #[netser(extends)]
    dog: Dog,
    #[netser(rename = "age_weeks")]
    weeks: Option<u16>,
}

#[derive(Serializable, Debug, PartialEq)]
struct Kennel {
    residents: Vec<Poly<Animal>>,
    nickname: Option<String>,
    kinds: Vec<TypeRef>,
}

fn puppy() -> Puppy {
    Puppy {
        dog: Dog {
            animal: Animal {
                name: "Rex".to_string(),
                legs: 4,
            },
            chip: 0xDEAD_BEEF,
            sound: "woof".to_string(),
            cache: Vec::new(),
        },
        weeks: Some(9),
    }
}

fn serdes() -> SerDes {
    SerDes::builder()
        .register::<Animal>()
        .register::<Dog>()
        .register::<Puppy>()
        .register::<Kennel>()
        .build()
        .unwrap()
}

#[test]
fn test_ids_follow_registration_order() {
    let serdes = serdes();
    let registry = serdes.schema().registry();
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.id_of(TypeId::of::<Animal>(), "Animal").unwrap(), 0);
    assert_eq!(registry.id_of(TypeId::of::<Puppy>(), "Puppy").unwrap(), 2);
    assert_eq!(registry.descriptor_of(3).unwrap().name, "Kennel");
    assert!(matches!(
        registry.descriptor_of(4),
        Err(SerDesError::UnknownTypeId(4))
    ));
    assert!(matches!(
        registry.id_of(TypeId::of::<String>(), "String"),
        Err(SerDesError::UnregisteredType { type_name: "String" })
    ));
}

#[test]
fn test_fields_are_flattened_root_first() {
    let serdes = serdes();
    let slots = serdes.schema().fields_of::<Puppy>().unwrap();
    let names: Vec<_> = slots.iter().map(|s| s.field.name).collect();
    assert_eq!(names, vec!["name", "legs", "chip", "sound", "age_weeks"]);
    let depths: Vec<_> = slots.iter().map(|s| s.depth).collect();
    assert_eq!(depths, vec![2, 2, 1, 1, 0]);
    let owners: Vec<_> = slots.iter().map(|s| s.field.declaring_type).collect();
    assert_eq!(owners, vec!["Animal", "Animal", "Dog", "Dog", "Puppy"]);
}

#[test]
fn test_field_kinds_and_mutability() {
    let serdes = serdes();
    let slots = serdes.schema().fields_of::<Puppy>().unwrap();
    assert_eq!(slots[0].field.kind, ValueKind::Text);
    assert_eq!(slots[1].field.kind, ValueKind::Primitive(PrimitiveKind::U8));
    assert!(slots[2].field.is_immutable());
    assert!(slots[3].field.is_constant());
    assert!(slots[3].field.access.is_none());
    assert_eq!(slots[4].field.kind, ValueKind::Boxed(PrimitiveKind::U16));
    assert_eq!(slots[4].field.mutability, Mutability::Mutable);

    let kennel = serdes.schema().fields_of::<Kennel>().unwrap();
    assert_eq!(
        kennel[0].field.kind,
        ValueKind::Sequence(Box::new(ValueKind::Nested {
            declared: Some(TypeKey::of::<Animal>()),
            polymorphic: true,
        }))
    );
    assert_eq!(
        kennel[2].field.kind,
        ValueKind::Sequence(Box::new(ValueKind::TypeLiteral))
    );
}

#[test]
fn test_fields_of_unregistered_type() {
    let serdes = SerDes::builder().register::<Animal>().build().unwrap();
    assert!(matches!(
        serdes.schema().fields_of::<Dog>(),
        Err(SerDesError::UnregisteredType { type_name: "Dog" })
    ));
    assert_eq!(Dog::TYPE_NAME, "Dog");
    let animal = serdes
        .schema()
        .model()
        .fields_of(TypeId::of::<Animal>(), Animal::TYPE_NAME)
        .unwrap();
    assert_eq!(animal.len(), 2);
}

#[test]
fn test_deep_inheritance_round_trip() {
    let serdes = serdes();
    let original = puppy();
    let decoded: Puppy = serdes.decode(&serdes.encode(&original).unwrap()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_bare_allocation_restores_constant_and_skipped_fields() {
    let serdes = serdes();
    let mut original = puppy();
    original.dog.cache = vec![1, 2, 3];
    let decoded: Puppy = serdes.decode(&serdes.encode(&original).unwrap()).unwrap();
    assert_eq!(decoded.dog.sound, "woof");
    assert!(decoded.dog.cache.is_empty());
    assert_eq!(decoded.dog.chip, 0xDEAD_BEEF);

    let bare = Dog::bare();
    assert_eq!(bare.sound, "woof");
    assert_eq!(bare.chip, 0);
}

#[test]
fn test_heterogeneous_sequence_of_base() {
    let serdes = serdes();
    let kennel = Kennel {
        residents: vec![
            Poly::new(Animal {
                name: "Tom".to_string(),
                legs: 4,
            }),
            Poly::new(puppy()),
        ],
        nickname: None,
        kinds: vec![TypeRef::of::<Dog>(), TypeRef::text()],
    };
    let decoded: Kennel = serdes.decode(&serdes.encode(&kennel).unwrap()).unwrap();
    assert_eq!(decoded, kennel);
    assert!(decoded.residents[1].is::<Puppy>());
    assert_eq!(decoded.residents[1].type_name(), "Puppy");
}

#[test]
fn test_fingerprint_depends_on_order() {
    let a = serdes();
    let b = serdes();
    assert_eq!(
        a.schema().registry().fingerprint(),
        b.schema().registry().fingerprint()
    );
    let reversed = SerDes::builder()
        .register::<Kennel>()
        .register::<Puppy>()
        .register::<Dog>()
        .register::<Animal>()
        .build()
        .unwrap();
    assert_ne!(
        a.schema().registry().fingerprint(),
        reversed.schema().registry().fingerprint()
    );
}

#[test]
fn test_new_with_descriptors() {
    let resolver: Arc<dyn TypeResolver> = Arc::new(NameTable::new().with("t", TypeRef::text()));
    let serdes = SerDes::new(
        Some(resolver),
        vec![TypeDescriptor::of::<Animal>(), TypeDescriptor::of::<Dog>()],
    )
    .unwrap();
    assert_eq!(serdes.config(), &Config::default());
    let named: TypeRef = serdes
        .decode(&serdes.encode(&TypeRef::Named("t".to_string())).unwrap())
        .unwrap();
    assert_eq!(named, TypeRef::text());
}

#[test]
fn test_shared_across_threads() {
    let serdes = Arc::new(serdes());
    let handles: Vec<_> = (0..4u8)
        .map(|n| {
            let serdes = Arc::clone(&serdes);
            thread::spawn(move || {
                for i in 0..50u8 {
                    let mut value = puppy();
                    value.dog.animal.legs = n;
                    value.weeks = Some(i as u16);
                    let bytes = serdes.encode(&value).unwrap();
                    let decoded: Puppy = serdes.decode(&bytes).unwrap();
                    assert_eq!(decoded, value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let cloned = (*serdes).clone();
    thread::spawn(move || cloned.encode(&puppy()).unwrap())
        .join()
        .unwrap();
}
