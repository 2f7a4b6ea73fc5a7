use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Hardware backend requested for ONNX inference.
///
/// CPU is always available; the others are only registered on platforms
/// whose `ort` build ships them and are skipped with a warning elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionProvider {
    Cpu,
    CoreMl,
    DirectMl,
}

impl ExecutionProvider {
    pub const ALL: [ExecutionProvider; 3] = [Self::Cpu, Self::CoreMl, Self::DirectMl];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::CoreMl => "coreml",
            Self::DirectMl => "directml",
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown execution provider '{s}' (expected cpu, coreml or directml)"))
    }
}

/// Return the preferred execution providers for the current platform.
pub fn preferred_execution_providers() -> Vec<ExecutionProvider> {
    #[cfg(target_os = "macos")]
    {
        vec![ExecutionProvider::CoreMl, ExecutionProvider::Cpu]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ExecutionProvider::DirectMl, ExecutionProvider::Cpu]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![ExecutionProvider::Cpu]
    }
}

/// Map requested providers to `ort` dispatches, in priority order.
///
/// CPU maps to nothing because ONNX Runtime always falls back to it.
pub fn dispatches(providers: &[ExecutionProvider]) -> Vec<ExecutionProviderDispatch> {
    providers.iter().filter_map(|p| dispatch(*p)).collect()
}

fn dispatch(provider: ExecutionProvider) -> Option<ExecutionProviderDispatch> {
    match provider {
        ExecutionProvider::Cpu => None,
        #[cfg(target_os = "macos")]
        ExecutionProvider::CoreMl => {
            Some(ort::execution_providers::CoreMLExecutionProvider::default().build())
        }
        #[cfg(target_os = "windows")]
        ExecutionProvider::DirectMl => {
            Some(ort::execution_providers::DirectMLExecutionProvider::default().build())
        }
        #[allow(unreachable_patterns)]
        other => {
            log::warn!("Execution provider '{other}' is not available on this platform; using CPU");
            None
        }
    }
}

/// Open an ONNX session with the requested providers.
pub fn create_session(
    model_path: &Path,
    providers: &[ExecutionProvider],
) -> Result<Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    log::debug!(
        "Loading {} with providers {:?}",
        model_path.display(),
        providers
    );
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(dispatches(providers))?
        .commit_from_file(model_path)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cpu", ExecutionProvider::Cpu)]
    #[case("CoreML", ExecutionProvider::CoreMl)]
    #[case(" directml ", ExecutionProvider::DirectMl)]
    fn test_parse_provider(#[case] input: &str, #[case] expected: ExecutionProvider) {
        assert_eq!(input.parse::<ExecutionProvider>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_provider_fails() {
        let err = "cuda".parse::<ExecutionProvider>().unwrap_err();
        assert!(err.contains("cuda"));
    }

    #[test]
    fn test_display_round_trips_name() {
        for p in ExecutionProvider::ALL {
            assert_eq!(p.to_string().parse::<ExecutionProvider>().unwrap(), p);
        }
    }

    #[test]
    fn test_cpu_needs_no_dispatch() {
        assert!(dispatches(&[ExecutionProvider::Cpu]).is_empty());
    }

    #[test]
    fn test_preferred_always_ends_with_cpu() {
        let preferred = preferred_execution_providers();
        assert_eq!(preferred.last(), Some(&ExecutionProvider::Cpu));
    }
}
