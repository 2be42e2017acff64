use crate::detection::domain::detector_options::Delegate;

/// Execution providers for the requested delegate on the current platform.
///
/// `Delegate::Cpu` and platforms without an accelerator return an empty
/// list, which leaves ONNX Runtime on its default CPU provider.
pub fn execution_providers_for(
    delegate: Delegate,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    match delegate {
        Delegate::Cpu => vec![],
        Delegate::Gpu => accelerated_providers(),
    }
}

fn accelerated_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default()
            .build()
            .error_on_failure()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default()
            .build()
            .error_on_failure()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
