/// Builds a `SignalContext` from `Class name: "type"` entries.
///
/// ```ignore
/// let ctx = signals! {
///     Input speed: "int16_T",
///     Output ack: "boolean",
/// };
/// ```
#[macro_export]
macro_rules! signals {
    ($($class:ident $name:ident : $ty:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut ctx = $crate::SignalContext::new();
        $(
            ctx.declare(stringify!($name), $crate::InterfaceClass::$class, $ty);
        )*
        ctx
    }};
}

/// Same as `signals!` but also registers enumerations first.
#[macro_export]
macro_rules! signals_with_enums {
    (
        enums { $($enum_name:ident => [$($literal:ident),* $(,)?]),* $(,)? }
        $($class:ident $name:ident : $ty:expr),* $(,)?
    ) => {{
        let mut ctx = $crate::SignalContext::new();
        $(
            ctx.declare_enum(stringify!($enum_name), &[$(stringify!($literal)),*]);
        )*
        $(
            ctx.declare(stringify!($name), $crate::InterfaceClass::$class, $ty);
        )*
        ctx
    }};
}
