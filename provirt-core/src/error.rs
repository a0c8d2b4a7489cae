use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid resource key: {input}")]
    InvalidResourceKey { input: String },

    #[error("Invalid provider configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Duplicate VM name ({name}) with vmid {vmid} on node {node}")]
    DuplicateVmName {
        name: String,
        vmid: u32,
        node: String,
    },

    #[error("VM not found: {name}")]
    VmNotFound { name: String },

    #[error("Invalid disk size: {value}")]
    InvalidDiskSize { value: String },

    #[error("Unknown provisioner action: {action}")]
    UnknownAction { action: String },

    #[error("Hypervisor operation '{operation}' failed: {details}")]
    Api { operation: String, details: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
