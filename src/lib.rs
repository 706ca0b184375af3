//! # clonescan
//!
//! Repository similarity detection: decide whether a target codebase shares
//! source files with one or more comparison codebases, local or remote.
//!
//! Each corpus is fetched into a snapshot of catalogued source files. Files
//! are paired by extension or base name, each pair is checked for
//! byte-identity and scored on normalized text, and the results are folded
//! into a single report with a risk level.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Sources    │──▶│   Catalog    │──▶│   Pairing    │──▶│   Scoring    │
//! │ local/GitHub │   │ ext + size   │   │ ext / name   │   │ hash + LCS   │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                  ▼
//!                                     ┌──────────────┐   ┌──────────────┐
//!                                     │    Report    │◀──│  Aggregate   │
//!                                     │ JSON / text  │   │ + risk level │
//!                                     └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! clonescan scan ./my-service octo/upstream ./vendor-drop
//! clonescan scan https://github.com/octo/app ./suspect --json > report.json
//! clonescan check-config --config ./clonescan.toml
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error types |
//! | [`models`] | Core data types |
//! | [`source`] | Corpus source trait and reference parsing |
//! | [`connector_fs`] | Local directory adapter |
//! | [`connector_github`] | GitHub contents API adapter |
//! | [`catalog`] | Extension and size filters |
//! | [`normalize`] | Comment stripping and whitespace folding |
//! | [`pairing`] | Candidate pair selection |
//! | [`similarity`] | Fingerprint check and LCS ratio |
//! | [`aggregate`] | Per-corpus results and report assembly |
//! | [`risk`] | Risk levels, thresholds, presets |
//! | [`detect`] | Run orchestration |
//! | [`report`] | JSON and text rendering |
//! | [`progress`] | Progress reporting on stderr |
//! | [`cancel`] | Cancellation token |
//! | [`sources`] | Configured corpora listing |

pub mod aggregate;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod connector_fs;
pub mod connector_github;
pub mod detect;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pairing;
pub mod progress;
pub mod report;
pub mod risk;
pub mod similarity;
pub mod source;
pub mod sources;
