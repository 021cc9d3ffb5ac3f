//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable backend module (storage, identity, notification) provides a
/// `Registry` struct implementing this trait, declaring the name used in the
/// configuration file and the factory that builds it.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
