// ─── Install tree helpers ───
// Size estimation, the size-gated copy strategy used by exports, and the
// recursive copy / move / remove primitives the orchestrator composes.

mod copy;
mod size;

pub use copy::{copy_dir_recursive, move_dir, remove_dir_if_exists, stage_game, CopyStrategy};
pub use size::size_of;
