use interfile_xnat::model::{FieldValue, Scalar};
use interfile_xnat::{
    interfile_listmode_to_xnat, ConvertError, FlattenOptions, SchemaError, XmlSchema,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn schema() -> XmlSchema {
    XmlSchema::from_file(fixture("interfile.xsd")).expect("fixture schema loads")
}

fn header() -> Vec<u8> {
    std::fs::read(fixture("NEMA_IQ.l.hdr")).expect("fixture header exists")
}

fn key(suffix: &str) -> String {
    format!("interfile:petLmScanData/{}", suffix)
}

#[test]
fn test_fixture_header_is_valid() {
    let schema = schema();
    assert_eq!(schema.target_namespace(), Some("http://ptb.de/interfile"));
    assert!(schema.is_valid(&header()));
}

#[test]
fn test_full_header_flattening() {
    let fields = interfile_listmode_to_xnat(&header(), &schema(), &FlattenOptions::default())
        .expect("header converts");

    let expected: Vec<(String, FieldValue)> = vec![
        ("scans".to_string(), FieldValue::from("interfile:petLmScanData")),
        (key("version"), FieldValue::from("3.3")),
        (key("scannerInformation/name"), FieldValue::from("GE Discovery 690")),
        (key("scannerInformation/numberOfRings"), FieldValue::from(24i64)),
        (
            key("scannerInformation/timeOfFlight"),
            FieldValue::Single(Scalar::Boolean(true)),
        ),
        (key("radionuclideInformation/radionuclide"), FieldValue::from("^18^Fluorine")),
        (key("radionuclideInformation/energy/@unit"), FieldValue::from("keV")),
        (key("radionuclideInformation/energy/$"), FieldValue::from(511.0)),
        (key("radionuclideInformation/halfLife"), FieldValue::from(6586.2)),
        (key("radionuclideInformation/branchingRatio"), FieldValue::from(0.97)),
        (key("examInformation/patientPosition"), FieldValue::from("HFS")),
        (key("examInformation/lowEnergyThres"), FieldValue::from(425.0)),
        (key("examInformation/highEnergyThres"), FieldValue::from(650.0)),
        // two frames share one key; the later frame wins
        (key("frameInformation/frame/frameStart"), FieldValue::from(1800.0)),
        (key("frameInformation/frame/frameEnd"), FieldValue::from(3600.0)),
        (
            key("encoding/parallelImaging/accelerationFactor/kspace_enc_step_1"),
            FieldValue::from(1i64),
        ),
        (
            key("encoding/parallelImaging/accelerationFactor/kspace_enc_step_2"),
            FieldValue::from(2i64),
        ),
    ];

    assert_eq!(fields.len(), expected.len());
    for (name, value) in &expected {
        assert_eq!(fields.get(name), Some(value), "field {}", name);
    }

    // record type first, then document order; the overwritten frame keeps its slot
    assert_eq!(
        fields.keys().collect::<Vec<_>>(),
        expected.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
    );

    // attributes of the root and user parameters are never flattened
    assert!(fields.keys().all(|k| !k.contains("xmlns")));
    assert!(fields.keys().all(|k| !k.contains("userParameter")));
}

#[test]
fn test_scan_query_renders_numbers_like_xnat_expects() {
    let fields = interfile_listmode_to_xnat(&header(), &schema(), &FlattenOptions::default())
        .expect("header converts");
    let pairs = fields.to_query_pairs();

    let value_of = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| *k == key(name))
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(value_of("radionuclideInformation/energy/$"), Some("511.0"));
    assert_eq!(value_of("scannerInformation/numberOfRings"), Some("24"));
    assert_eq!(value_of("scannerInformation/timeOfFlight"), Some("True"));
}

#[test]
fn test_pass_cap_truncates_deep_structure() {
    let options = FlattenOptions {
        max_passes: 2,
        ..Default::default()
    };
    let fields = interfile_listmode_to_xnat(&header(), &schema(), &options).expect("header converts");

    assert!(fields.contains_key(&key("frameInformation/frame/frameEnd")));
    assert!(fields.keys().all(|k| !k.contains("kspace")));
}

#[test]
fn test_repeated_conversion_is_identical() {
    let schema = schema();
    let options = FlattenOptions::default();
    let first = interfile_listmode_to_xnat(&header(), &schema, &options).unwrap();
    let second = interfile_listmode_to_xnat(&header(), &schema, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_invalid_header_aborts_conversion() {
    let header = String::from_utf8(header())
        .unwrap()
        .replace("<patientPosition>HFS</patientPosition>", "<patientPosition>SIDE</patientPosition>");

    let err = interfile_listmode_to_xnat(header.as_bytes(), &schema(), &FlattenOptions::default())
        .unwrap_err();
    match err {
        ConvertError::Schema(SchemaError::NotInEnumeration { location, value }) => {
            assert_eq!(location, "/interfileListmodeHeader/examInformation/patientPosition");
            assert_eq!(value, "SIDE");
        }
        other => panic!("Expected enumeration failure, got {:?}", other),
    }
}

#[test]
fn test_missing_required_group_aborts_conversion() {
    let header = String::from_utf8(header()).unwrap().replace("<version>3.3</version>", "");

    let err = interfile_listmode_to_xnat(header.as_bytes(), &schema(), &FlattenOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Schema(SchemaError::MissingElement { ref name, .. }) if name == "version"
    ));
}
