//! The shipped scenario files parse, validate, and match the built-in presets.

use std::path::{Path, PathBuf};

use hess_dispatch::config::{GridAwarenessPolicy, PlantConfig};
use hess_dispatch::sim::engine::Engine;

fn scenario(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(format!("{name}.toml"))
}

#[test]
fn every_preset_has_a_matching_scenario_file() {
    for name in PlantConfig::PRESETS {
        let from_file = PlantConfig::from_toml_file(&scenario(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(from_file.validate().is_empty(), "{name}");

        let preset = PlantConfig::from_preset(name).unwrap();
        assert_eq!(format!("{from_file:?}"), format!("{preset:?}"), "{name}");
    }
}

#[test]
fn scenario_files_build_engines() {
    for name in PlantConfig::PRESETS {
        let cfg = PlantConfig::from_toml_file(&scenario(name)).unwrap();
        let engine = Engine::new(cfg).unwrap();
        assert_eq!(engine.tick(), 0);
    }
}

#[test]
fn islanded_file_selects_islanded_policy() {
    let cfg = PlantConfig::from_toml_file(&scenario("islanded")).unwrap();
    assert_eq!(cfg.policy, GridAwarenessPolicy::Islanded);
    assert_eq!(cfg.fuel_cell.h2_nominal_flow, 30.0);
}

#[test]
fn missing_scenario_file_reports_path() {
    let err = PlantConfig::from_toml_file(&scenario("does_not_exist")).unwrap_err();
    assert_eq!(err.field, "config");
    assert!(err.message.contains("does_not_exist.toml"));
}
