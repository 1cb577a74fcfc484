//! Verifying that an unlocking script satisfies a locking script.

use thiserror::Error;
use tracing::debug;

use crate::{
    interpreter::{self, cast_to_bool, Environment, Flags, Limits, SignatureChecker},
    script::{self, OperationList},
};

/// Which of the two scripts an error came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// The script supplied by the spender.
    Unlocking,
    /// The script attached to the output being spent.
    Locking,
}

/// Reasons a pair of scripts can fail to verify.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0:?} script is too large ({1} bytes)")]
    ScriptSize(Component, usize),

    #[error("{0:?} script failed to parse: {1}")]
    Parse(Component, script::Error),

    #[error("unlocking script contains operations other than pushes")]
    SigPushOnly,

    #[error("execution failed: {0}")]
    Execution(#[from] interpreter::Error),

    #[error("a clean stack was required, but {0} elements remain")]
    CleanStack(usize),
}

fn parse_component(
    component: Component,
    bytes: &[u8],
    flags: Flags,
) -> Result<OperationList, Error> {
    script::parse(bytes, flags).map_err(|err| {
        debug!(?component, %err, "parse failed");
        Error::Parse(component, err)
    })
}

/// Runs `unlocking` followed by `locking` and reports whether the spend is authorized.
///
/// Each script must parse on its own, so a conditional can’t straddle the two. `Ok(false)` means
/// that execution succeeded but left a false value (or nothing) on top of the stack.
pub fn verify(
    unlocking: &[u8],
    locking: &[u8],
    limits: &Limits,
    flags: Flags,
    checker: &dyn SignatureChecker,
) -> Result<bool, Error> {
    for (component, bytes) in [
        (Component::Unlocking, unlocking),
        (Component::Locking, locking),
    ] {
        if bytes.len() > limits.max_script_size {
            debug!(?component, size = bytes.len(), "script too large");
            return Err(Error::ScriptSize(component, bytes.len()));
        }
    }

    let unlocking_ops = parse_component(Component::Unlocking, unlocking, flags)?;
    let locking_ops = parse_component(Component::Locking, locking, flags)?;

    if flags.contains(Flags::SigPushOnly) && !unlocking_ops.is_push_only() {
        return Err(Error::SigPushOnly);
    }

    let mut env = Environment::new(*limits, flags).with_checker(checker, locking);
    interpreter::execute(&unlocking_ops.concat(&locking_ops), &mut env).map_err(|err| {
        debug!(%err, op_count = env.op_count(), "execution failed");
        err
    })?;

    let stack = env.into_stack();
    match stack.last() {
        Ok(top) if cast_to_bool(top) => {
            if flags.contains(Flags::CleanStack) && stack.len() != 1 {
                Err(Error::CleanStack(stack.len()))
            } else {
                Ok(true)
            }
        }
        _ => Ok(false),
    }
}

/// The external API of this crate, so that alternative verifiers can be substituted.
pub trait ScriptVerifier {
    /// Returns `Ok(true)` if `unlocking` correctly spends an output locked by `locking` under the
    /// constraints specified by `flags`. See [`verify`].
    fn verify(&self, unlocking: &[u8], locking: &[u8], flags: Flags) -> Result<bool, Error>;

    /// Returns the number of signature operations in `script`, counting every
    /// `CHECKMULTISIG` as the maximum number of keys.
    fn sig_op_count(&self, script: &[u8]) -> Result<u32, Error>;
}

/// The interpreter in this crate, with a fixed signature checker.
#[derive(Copy, Clone, Debug)]
pub struct Interpreter<C> {
    checker: C,
    limits: Limits,
}

impl<C: SignatureChecker> Interpreter<C> {
    /// Uses the default [`Limits`].
    pub fn new(checker: C) -> Self {
        Interpreter {
            checker,
            limits: Limits::default(),
        }
    }

    /// Replaces the resource bounds.
    pub fn with_limits(self, limits: Limits) -> Self {
        Interpreter { limits, ..self }
    }

    /// The resource bounds in effect.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

impl<C: SignatureChecker> ScriptVerifier for Interpreter<C> {
    fn verify(&self, unlocking: &[u8], locking: &[u8], flags: Flags) -> Result<bool, Error> {
        verify(unlocking, locking, &self.limits, flags, &self.checker)
    }

    fn sig_op_count(&self, script: &[u8]) -> Result<u32, Error> {
        // Reserved bytes don’t affect the count, so don’t let them prevent it.
        parse_component(Component::Locking, script, Flags::DeferReserved)
            .map(|ops| ops.sig_op_count(false))
    }
}

/// One input to check with [`verify_batch`].
#[cfg(feature = "parallel")]
#[derive(Copy, Clone)]
pub struct Input<'a> {
    /// The spender’s script.
    pub unlocking: &'a [u8],
    /// The script of the output being spent.
    pub locking: &'a [u8],
    /// The checker for this input’s signatures and lock time.
    pub checker: &'a (dyn SignatureChecker + Sync),
}

/// Verifies many inputs at once on the rayon thread pool. Results are in input order.
#[cfg(feature = "parallel")]
pub fn verify_batch(
    inputs: &[Input<'_>],
    limits: &Limits,
    flags: Flags,
) -> std::vec::Vec<Result<bool, Error>> {
    use rayon::prelude::*;

    inputs
        .par_iter()
        .map(|input| verify(input.unlocking, input.locking, limits, flags, input.checker))
        .collect()
}
