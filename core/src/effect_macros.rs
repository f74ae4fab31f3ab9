//! Declarative macros for effect construction.

/// Create an `Effect::Future` from the body of an `async move` block.
///
/// Dependencies used inside the body must be cloned out of the environment
/// first, since the future has to be `'static`.
///
/// # Example
///
/// ```rust,ignore
/// use quill_core::async_effect;
///
/// let identity = env.identity.clone();
/// async_effect! {
///     match identity.sign_out().await {
///         Ok(()) => Some(SessionAction::SignedOut),
///         Err(error) => Some(SessionAction::SignOutFailed { error: error.to_string() }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}
