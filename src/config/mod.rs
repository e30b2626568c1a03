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

// Configuration module for the DDS recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable expansion and overrides
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use loader::{load_config, load_config_with_env};
pub use types::*;
