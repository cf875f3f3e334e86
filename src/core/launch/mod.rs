mod process;

pub use process::launch_game;
