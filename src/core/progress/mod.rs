mod blend;
mod emitter;

pub use blend::{overall, ProgressBlender, Stage};
pub use emitter::{ProgressChannel, ProgressEmitter, ProgressEvent, ProgressHub, ProgressListener};
