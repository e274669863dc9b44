use approx::assert_relative_eq;
use assert_cmd::Command;
use std::path::{Path, PathBuf};

fn write_cube_table(dir: &Path, name: &str, scale: f64) -> PathBuf {
    let path = dir.join(format!("{}.csv", name));
    let mut rows = vec!["x,y,z,l,a".to_string()];
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                rows.push(format!("{}, {}, {}, {}, {}", x, y, z, scale * (x + y + z), -z));
            }
        }
    }
    std::fs::write(&path, rows.join("\n")).unwrap();
    path
}

fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .unwrap();
    rdr.records().map(|r| r.unwrap()).collect()
}

#[test]
fn test_grid_over_two_channels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let red = write_cube_table(temp_dir.path(), "red", 1.0);
    let green = write_cube_table(temp_dir.path(), "green", 2.0);
    let output_file = temp_dir.path().join("response.csv");

    let mut cmd = Command::cargo_bin("color-interp").unwrap();
    cmd.arg("--input")
        .arg(&red)
        .arg(&green)
        .arg("--output")
        .arg(&output_file)
        .arg("--grid-min")
        .arg("0")
        .arg("--grid-max")
        .arg("1")
        .arg("--grid-step")
        .arg("0.5")
        .arg("--jobs")
        .arg("2")
        .arg("--config")
        .arg(temp_dir.path().join("missing.config"))
        .assert()
        .success();

    let rows = read_rows(&output_file);
    // 27 grid points for each channel.
    assert_eq!(rows.len(), 54);
    assert!(rows.iter().all(|r| &r[4] == "inside"));

    let centre = rows
        .iter()
        .find(|r| &r[0] == "green" && &r[1] == "0.5" && &r[2] == "0.5" && &r[3] == "0.5")
        .unwrap();
    let l: f64 = centre[5].parse().unwrap();
    let a: f64 = centre[6].parse().unwrap();
    assert_relative_eq!(l, 3.0, epsilon = 1e-9);
    assert_relative_eq!(a, -0.5, epsilon = 1e-9);
}

#[test]
fn test_outside_points_use_requested_policy() {
    let temp_dir = tempfile::tempdir().unwrap();
    let red = write_cube_table(temp_dir.path(), "red", 1.0);
    let output_file = temp_dir.path().join("response.csv");

    let mut cmd = Command::cargo_bin("color-interp").unwrap();
    cmd.arg("--input")
        .arg(&red)
        .arg("--output")
        .arg(&output_file)
        .arg("--grid-min")
        .arg("0")
        .arg("--grid-max")
        .arg("2")
        .arg("--grid-step")
        .arg("1")
        .arg("--outside")
        .arg("zero")
        .arg("--strategy")
        .arg("natural-neighbor")
        .arg("--config")
        .arg(temp_dir.path().join("missing.config"))
        .assert()
        .success();

    let rows = read_rows(&output_file);
    assert_eq!(rows.len(), 27);
    let outside: Vec<_> = rows.iter().filter(|r| &r[4] == "outside").collect();
    assert_eq!(outside.len(), 27 - 8);
    assert!(outside.iter().all(|r| &r[5] == "0" && &r[6] == "0"));
}

#[test]
fn test_config_file_is_read() {
    let temp_dir = tempfile::tempdir().unwrap();
    let red = write_cube_table(temp_dir.path(), "red", 1.0);
    let output_file = temp_dir.path().join("response.csv");
    let config = temp_dir.path().join("app.config");
    std::fs::write(&config, "outside_hull = nearest\nchunk_size = 3\n").unwrap();

    let mut cmd = Command::cargo_bin("color-interp").unwrap();
    cmd.arg("--input")
        .arg(&red)
        .arg("--output")
        .arg(&output_file)
        .arg("--dim")
        .arg("3")
        .arg("--grid-min")
        .arg("1")
        .arg("--grid-max")
        .arg("2")
        .arg("--grid-step")
        .arg("1")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let rows = read_rows(&output_file);
    let far = rows
        .iter()
        .find(|r| &r[1] == "2" && &r[2] == "2" && &r[3] == "2")
        .unwrap();
    assert_eq!(&far[4], "outside");
    assert_eq!(&far[5], "3");
}

#[test]
fn test_duplicate_samples_fail_when_no_channel_remains() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.csv");
    std::fs::write(&path, "x,y,v\n0,0,1\n1,0,2\n0,1,3\n1,0,4\n").unwrap();

    let mut cmd = Command::cargo_bin("color-interp").unwrap();
    cmd.arg("--input")
        .arg(&path)
        .arg("--output")
        .arg(temp_dir.path().join("out.csv"))
        .arg("--dim")
        .arg("2")
        .arg("--grid-max")
        .arg("1")
        .arg("--config")
        .arg(temp_dir.path().join("missing.config"))
        .assert()
        .failure();
}

#[test]
fn test_malformed_table_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("bad.csv");
    std::fs::write(&path, "x,y,v\n0,0,1\n1,zero,2\n").unwrap();

    let mut cmd = Command::cargo_bin("color-interp").unwrap();
    let assert = cmd
        .arg("--input")
        .arg(&path)
        .arg("--output")
        .arg(temp_dir.path().join("out.csv"))
        .arg("--dim")
        .arg("2")
        .arg("--config")
        .arg(temp_dir.path().join("missing.config"))
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("Invalid number 'zero' at line 3, column 2"));
}
