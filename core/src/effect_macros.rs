//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants in
//! reducers, particularly for keyed remote calls.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use pitstop_core::async_effect;
///
/// async_effect! {
///     let result = client.list_tires().await;
///     Some(InventoryAction::TiresLoaded(result))
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

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use pitstop_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(3),
///     action: BookingAction::DismissSuccess
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create a single-flight `Effect::Cancellable` around an async block
///
/// # Example
///
/// ```rust,ignore
/// use pitstop_core::cancellable;
///
/// cancellable! {
///     id: "load-news",
///     async {
///         Some(NewsAction::Loaded(client.list_news().await))
///     }
/// }
/// ```
#[macro_export]
macro_rules! cancellable {
    (
        id: $id:expr,
        async { $($body:tt)* }
    ) => {
        $crate::effect::Effect::cancellable(
            $id,
            $crate::async_effect! { $($body)* },
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;
    use std::time::Duration;

    #[derive(Clone, Debug)]
    enum TestAction {
        Loaded { value: i32 },
        TimeoutExpired,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Loaded { value: 42 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(30),
            action: TestAction::TimeoutExpired
        };

        assert!(matches!(effect, Effect::Delay { .. }));
    }

    #[test]
    fn test_cancellable_macro() {
        let effect = cancellable! {
            id: "load",
            async { Some(TestAction::Loaded { value: 1 }) }
        };

        match effect {
            Effect::Cancellable { id, effect } => {
                assert_eq!(id.as_str(), "load");
                assert!(matches!(*effect, Effect::Future(_)));
            },
            other => unreachable!("expected cancellable effect, got {other:?}"),
        }
    }
}
