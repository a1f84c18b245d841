use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn vmprov() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("vmprov").unwrap()
}

const SPEC: &str = r#"{
    "Metadata": {"VirtualMachineId": "vm-1", "VmOwnerId": "owner-9"},
    "HostSystem": {"DistributionName": "ubuntu", "Bit": 64},
    "Network": {"IP": "", "Netmask": "", "Gateway": "", "Hostname": ""},
    "Resources": {"CpuNum": 2, "MemoryInMegabytes": 4096},
    "Disk": {"CapacityInKB": 20000},
    "Datacenter": {"ItemPath": "/dc1"}
}"#;

const FIXTURE: &str = r#"
[[datacenters]]
path = "/dc1"
id = "datacenter-2"

[[vms]]
id = "vm-1"
owner_id = "owner-9"
path = "/dc1/vm/web-01"
moref = "vm-42"
datastores = [{ name = "ssd-a", id = "datastore-11" }]
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn compile_cmd(spec: &Path, fixture: &Path) -> Command {
    let mut cmd = vmprov();
    cmd.arg("compile")
        .arg("--spec")
        .arg(spec)
        .arg("--fixture")
        .arg(fixture);
    cmd
}

fn stdout_json(assert: assert_cmd::assert::Assert) -> serde_json::Value {
    let stdout = assert.get_output().stdout.clone();
    serde_json::from_slice(&stdout).unwrap()
}

#[test]
fn test_help_exits_successfully() {
    vmprov().arg("--help").assert().success();
}

#[test]
fn test_version_exits_successfully() {
    vmprov()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vmprov"));
}

#[test]
fn test_no_args_shows_usage() {
    vmprov()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_all_subcommands() {
    let assert = vmprov().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for cmd in ["compile", "check", "config"] {
        assert!(
            output.contains(cmd),
            "Help output should list '{}' subcommand",
            cmd
        );
    }
}

#[test]
fn test_compile_prints_full_result() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    let json = stdout_json(compile_cmd(&spec, &fixture).assert().success());
    assert_eq!(json["Datacenter"]["InventoryPath"], "/dc1");
    assert_eq!(json["Storage"]["Descriptor"]["Datastore"]["Name"], "ssd-a");
    assert_eq!(json["Resources"]["CpuCount"], 2);
    assert_eq!(json["Network"]["Descriptor"]["IPv4"]["Source"], "Generated");
    assert!(json["HostSystem"]["Options"]["CustomizationLinuxOptions"].is_object());
}

#[test]
fn test_compile_customization_view() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    let json = stdout_json(
        compile_cmd(&spec, &fixture)
            .arg("--customization")
            .assert()
            .success(),
    );
    assert_eq!(
        json["Identity"]["CustomizationLinuxPrep"]["HostName"]["Name"],
        "vm-vm-1"
    );
    assert!(json["NicSettingMap"][0]["Adapter"]["Ip"]["CustomizationFixedIp"].is_object());
}

#[test]
fn test_compile_config_spec_view() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    let json = stdout_json(
        compile_cmd(&spec, &fixture)
            .arg("--config-spec")
            .assert()
            .success(),
    );
    assert_eq!(json["NumCPUs"], 2);
    assert_eq!(json["DeviceChange"][0]["Device"]["CapacityInKB"], 20000);
}

#[test]
fn test_compile_unsupported_os_reports_stage() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", &SPEC.replace("ubuntu", "plan9"));
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    compile_cmd(&spec, &fixture)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("host_system stage failed"))
        .stderr(predicate::str::contains("unsupported"));
}

#[test]
fn test_compile_validation_lists_fields() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let fixture = write(&dir, "fixture.toml", FIXTURE);
    let config = write(
        &dir,
        "vmprov.toml",
        "[network.generators]\nip = \"none\"\nhostname = \"none\"\n",
    );

    compile_cmd(&spec, &fixture)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("network stage failed"))
        .stderr(predicate::str::contains("IP, Hostname"));
}

#[test]
fn test_compile_foreign_owner_is_not_found() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", &SPEC.replace("owner-9", "owner-1"));
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    compile_cmd(&spec, &fixture)
        .assert()
        .failure()
        .stderr(predicate::str::contains("storage stage failed"))
        .stderr(predicate::str::contains("not_found"));
}

#[test]
fn test_compile_malformed_spec() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", "{\"Metadata\": ");
    let fixture = write(&dir, "fixture.toml", FIXTURE);

    compile_cmd(&spec, &fixture)
        .assert()
        .failure()
        .stderr(predicate::str::contains("decode stage failed"));
}

#[test]
fn test_check_runs_without_fixture() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);

    let json = stdout_json(vmprov().arg("check").arg(&spec).assert().success());
    assert_eq!(json["DatacenterPath"], "/dc1");
    assert_eq!(json["CapacityInKB"], 20000);
}

#[test]
fn test_check_reports_range_error() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", &SPEC.replace("\"CpuNum\": 2", "\"CpuNum\": -1"));

    vmprov()
        .arg("check")
        .arg(&spec)
        .assert()
        .failure()
        .stderr(predicate::str::contains("resources stage failed"))
        .stderr(predicate::str::contains("range"));
}

#[test]
fn test_config_prints_defaults() {
    vmprov()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_secs = 60"))
        .stdout(predicate::str::contains("ipv4_pool = \"10.240.0.0/24\""));
}

#[test]
fn test_config_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "vmprov.toml", "[remote]\ntimeout_secs = 0\n");

    vmprov()
        .arg("config")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote.timeout_secs"));
}
