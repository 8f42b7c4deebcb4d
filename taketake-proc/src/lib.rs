//! External-tool runner: builds argv from named templates, spawns child
//! processes, captures their output, and surfaces non-zero exits. The
//! out-of-process half of every collaborator named in spec §6.

pub mod runner;
pub mod template;

pub use runner::{check_status, drive, run, spawn_piped, ProcessOutput};
pub use template::{registry, render, ArgTemplate};
