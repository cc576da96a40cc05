use std::fmt;

use sorng_vmware::{VmwareError, VmwareErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Failure,
    InvalidArgs,
    ActiveSnapshot,
    Transport,
    Authentication,
    ProtocolFault,
    UnexpectedStatus,
    MalformedResponse,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::Failure => 1,
            ExitCode::InvalidArgs => 2,
            ExitCode::ActiveSnapshot => 3,
            ExitCode::Transport => 10,
            ExitCode::Authentication => 11,
            ExitCode::ProtocolFault => 12,
            ExitCode::UnexpectedStatus => 13,
            ExitCode::MalformedResponse => 14,
        }
    }

    pub const fn from_kind(kind: VmwareErrorKind) -> Self {
        match kind {
            VmwareErrorKind::TransportError => ExitCode::Transport,
            VmwareErrorKind::AuthenticationError => ExitCode::Authentication,
            VmwareErrorKind::ProtocolFault => ExitCode::ProtocolFault,
            VmwareErrorKind::UnexpectedStatus(_) => ExitCode::UnexpectedStatus,
            VmwareErrorKind::MalformedResponse => ExitCode::MalformedResponse,
            VmwareErrorKind::ConfigError => ExitCode::InvalidArgs,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    if let Some(vmware) = err.downcast_ref::<VmwareError>() {
        return ExitCode::from_kind(vmware.kind).as_i32();
    }
    ExitCode::Failure.as_i32()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn active_snapshot(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::ActiveSnapshot, anyhow::anyhow!(message.into())).into()
}

pub fn vmware(err: VmwareError) -> anyhow::Error {
    let code = ExitCode::from_kind(err.kind);
    ExitError::new(code, err.into()).into()
}
