pub mod runtime;

pub use runtime::{
    detect_java_installations, find_java, is_java_compatible_major, probe_java, JavaInstallation,
};
