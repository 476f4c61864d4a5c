use nx_ir::DataPath;
use nx_schema::{NxType, Occurrence, SchemaLoader};
use nx_template::build_template;
use std::path::PathBuf;

fn loader() -> SchemaLoader {
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../nx-schema/tests/data");
    SchemaLoader::from_paths(vec![data])
}

#[test]
fn test_xrd_measurement_template() -> anyhow::Result<()> {
    let template = build_template(&loader(), "XRDMeasurement", &[])?;
    assert_eq!(template.name(), "XRDMeasurement");

    let energy = template.get("/beam/energy").expect("energy spec");
    assert!(energy.is_required());
    assert!(energy.needs_unit());
    assert_eq!(energy.data_type, Some(NxType::Float));
    let wavelength = template.get("/beam/wavelength").expect("wavelength spec");
    assert_eq!(wavelength.occurrence, Occurrence::Optional);
    Ok(())
}

#[test]
fn test_application_with_base_class_mixins() -> anyhow::Result<()> {
    let mixins = vec!["NXentry".to_string(), "NXbeam".to_string()];
    let template = build_template(&loader(), "NXxrd_scan", &mixins)?;

    // Application paths keep application occurrence
    assert!(template.get("/ENTRY/title").unwrap().is_required());
    // NXentry fills in paths the application does not mention
    let end_time = template.get("/ENTRY/end_time").unwrap();
    assert_eq!(end_time.occurrence, Occurrence::Optional);
    assert_eq!(end_time.data_type, Some(NxType::DateTime));
    // NXbeam is overlaid beneath the beam group
    let flux = template.get("/ENTRY/INSTRUMENT/beam/flux").unwrap();
    assert_eq!(flux.units.as_deref(), Some("NX_FLUX"));
    assert_eq!(flux.source, "NXbeam");

    let resolved = template
        .resolve(&DataPath::parse("/ENTRY[entry]/INSTRUMENT[instrument]/beam/flux")?)
        .expect("flux resolves");
    assert_eq!(resolved.output_path(), "/entry/instrument/beam/flux");
    Ok(())
}

#[test]
fn test_dump_lists_every_path() -> anyhow::Result<()> {
    let template = build_template(&loader(), "NXxrd_scan", &[])?;
    let dump = template.dump();
    assert!(dump.starts_with("# Template for NXxrd_scan"));
    assert!(dump.contains("/ENTRY/INSTRUMENT/beam/incident_wavelength"));
    assert!(dump.contains("recommended"));
    assert_eq!(dump.lines().count(), template.len() + 1);
    Ok(())
}

#[test]
fn test_missing_mixin_is_reported() {
    let err = build_template(&loader(), "NXxrd_scan", &["NXnothing".to_string()]).unwrap_err();
    assert!(err.to_string().contains("NXnothing"));
}
