//! Declarative macros for extension modules.

/// Export a module's extensions to the host.
///
/// Generates the two FFI entry points the host looks up after loading the
/// module: `plughost_abi_version` and `plughost_create_extensions`. Each
/// expression is evaluated once per discovery call and boxed.
///
/// # Example
///
/// ```rust,ignore
/// use plughost_extension_sdk::prelude::*;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Extension for Echo {
///     async fn load(&mut self, _cancel: CancellationToken) -> HookResult { Ok(()) }
///     async fn unload(&mut self, _cancel: CancellationToken) -> HookResult { Ok(()) }
/// }
///
/// export_extensions!(Echo);
/// ```
#[macro_export]
macro_rules! export_extensions {
    ($($ctor:expr),* $(,)?) => {
        #[no_mangle]
        pub extern "C" fn plughost_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn plughost_create_extensions() -> *mut $crate::ExtensionBatch {
            let extensions: ::std::vec::Vec<$crate::BoxedExtension> = ::std::vec![
                $(::std::boxed::Box::new($ctor) as $crate::BoxedExtension),*
            ];
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(
                $crate::ExtensionBatch::new(extensions),
            ))
        }
    };
}
