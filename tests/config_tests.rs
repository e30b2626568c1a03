// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Configuration loading integration tests
///
use dds_recorder::config::{load_config, load_config_with_env, CompressionType};
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("recorder.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
output:
  directory: /data/recordings
  prefix: session
storage:
  max_file_size: 67108864
  max_size: 268435456
  safety_margin: 32768
  compression: lz4
handler:
  buffer_size: 50
  event_window_seconds: 10.0
  cleanup_period_seconds: 2.0
  max_pending_samples: 500
  only_with_schema: true
  record_types: false
  downsampling: 2
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.output.directory, "/data/recordings");
    assert_eq!(config.output.prefix, "session");
    assert_eq!(config.storage.max_file_size, 67108864);
    assert_eq!(config.storage.max_size, 268435456);
    assert_eq!(config.storage.compression, CompressionType::Lz4);
    assert_eq!(config.handler.buffer_size, 50);
    assert!(config.handler.only_with_schema);
    assert!(!config.handler.record_types);
    assert_eq!(config.handler.downsampling, 2);
}

#[test]
fn test_defaults_fill_missing_sections() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
output:
  directory: /data/recordings
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.output.prefix, "recording");
    assert_eq!(config.storage.compression, CompressionType::Zstd);
    assert_eq!(config.handler.buffer_size, 100);
    assert!(config.handler.record_types);

    // max_file_size defaults to 0: rotation disabled.
    assert_eq!(
        config.storage.effective_max_file_size(),
        config.storage.max_size
    );
}

#[test]
fn test_env_substitution_in_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
output:
  directory: ${RECORDER_TEST_DIR:-/tmp/recordings}
  prefix: ${RECORDER_TEST_PREFIX:-fallback}
"#,
    );

    std::env::set_var("RECORDER_TEST_PREFIX", "from-env");
    let config = load_config(&path).unwrap();
    std::env::remove_var("RECORDER_TEST_PREFIX");

    assert_eq!(config.output.directory, "/tmp/recordings");
    assert_eq!(config.output.prefix, "from-env");
}

#[test]
fn test_env_override_entry_point() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
output:
  directory: /data/recordings
  prefix: yaml-prefix
"#,
    );

    std::env::set_var("DDS_RECORDER_PREFIX", "env-prefix");
    let config = load_config_with_env(&path).unwrap();
    std::env::remove_var("DDS_RECORDER_PREFIX");

    assert_eq!(config.output.prefix, "env-prefix");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
storage:
  max_file_size: 2048
  max_size: 1024
"#,
    );

    assert!(load_config(&path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(load_config(dir.path().join("nope.yaml")).is_err());
}
