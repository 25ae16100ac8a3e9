pub mod arguments;
pub mod classpath;
pub mod process;

pub use arguments::{build_game_arguments, build_jvm_arguments, ArgumentContext, ArgumentValues};
pub use classpath::{build_classpath, classpath_entries, classpath_separator, extract_natives};
pub use process::{launch, prepare_launch, LaunchCommand, LaunchOptions, LaunchOutcome, WindowProbe};
