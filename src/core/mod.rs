// ─── Gameshelf Core ───
// Archive transfer pipeline behind the game library.
//
// Architecture:
//   core/
//     downloader/ — Streaming single-attempt HTTP downloads
//     archive/    — Extract/compress engines (7-Zip process, in-process zip)
//     install/    — Install size, copy strategy, directory copy/move
//     game/       — Game metadata + bundle manifest (config.json)
//     progress/   — Stage blending + single-subscriber event hub
//     transfer/   — Download-install, export and import jobs
//     launch/     — Detached game process spawner
//     state/      — Key-value settings store

pub mod archive;
pub mod config;
pub mod downloader;
pub mod error;
pub mod game;
pub mod http;
pub mod install;
pub mod launch;
pub mod progress;
pub mod state;
pub mod transfer;
