mod ssh;

pub use ssh::{SshExecutor, SshSession};
