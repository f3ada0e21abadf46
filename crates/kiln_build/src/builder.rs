//! The surface project graphs drive artifact builds through.

use crate::decision::Decision;
use crate::engine::ArtifactBuild;
use crate::phase::Phase;
use crate::stop::StopHandle;
use std::io::{self, Read, Write};

/// A buildable artifact.
pub trait Builder: Send {
    /// The artifact name.
    fn name(&self) -> &str;

    /// Builds into the configured output location.
    fn build(&mut self, incremental: bool) -> io::Result<u64>;

    /// Builds into `output`.
    fn build_to(&mut self, output: &mut dyn Write, incremental: bool) -> io::Result<u64>;

    /// A handle that cancels this build from another thread.
    fn stop_handle(&self) -> StopHandle;

    /// Requests cancellation. Never blocks.
    fn stop(&self) {
        self.stop_handle().request();
    }

    /// Discards retained state and deletes cache and output files.
    fn clean(&mut self) -> io::Result<()>;

    /// Restores state from an incremental-cache stream.
    fn load(&mut self, input: &mut dyn Read) -> io::Result<bool>;

    /// Writes state to an incremental-cache stream.
    fn save(&self, output: &mut dyn Write) -> io::Result<u64>;

    /// The current pipeline phase.
    fn phase(&self) -> Phase;

    /// The decision of the last compile.
    fn last_decision(&self) -> Option<Decision>;
}

impl Builder for ArtifactBuild {
    fn name(&self) -> &str {
        ArtifactBuild::name(self)
    }

    fn build(&mut self, incremental: bool) -> io::Result<u64> {
        ArtifactBuild::build(self, incremental)
    }

    fn build_to(&mut self, output: &mut dyn Write, incremental: bool) -> io::Result<u64> {
        ArtifactBuild::build_to(self, output, incremental)
    }

    fn stop_handle(&self) -> StopHandle {
        ArtifactBuild::stop_handle(self)
    }

    fn clean(&mut self) -> io::Result<()> {
        ArtifactBuild::clean(self)
    }

    fn load(&mut self, input: &mut dyn Read) -> io::Result<bool> {
        ArtifactBuild::load(self, input)
    }

    fn save(&self, output: &mut dyn Write) -> io::Result<u64> {
        ArtifactBuild::save(self, output)
    }

    fn phase(&self) -> Phase {
        ArtifactBuild::phase(self)
    }

    fn last_decision(&self) -> Option<Decision> {
        ArtifactBuild::last_decision(self)
    }
}

/// Implements [`Builder`] for a wrapper that derefs to [`ArtifactBuild`].
macro_rules! forward_builder {
    ($ty:ty) => {
        impl $crate::builder::Builder for $ty {
            fn name(&self) -> &str {
                self.engine().name()
            }

            fn build(&mut self, incremental: bool) -> std::io::Result<u64> {
                self.engine_mut().build(incremental)
            }

            fn build_to(
                &mut self,
                output: &mut dyn std::io::Write,
                incremental: bool,
            ) -> std::io::Result<u64> {
                self.engine_mut().build_to(output, incremental)
            }

            fn stop_handle(&self) -> $crate::stop::StopHandle {
                self.engine().stop_handle()
            }

            fn clean(&mut self) -> std::io::Result<()> {
                self.engine_mut().clean()
            }

            fn load(&mut self, input: &mut dyn std::io::Read) -> std::io::Result<bool> {
                self.engine_mut().load(input)
            }

            fn save(&self, output: &mut dyn std::io::Write) -> std::io::Result<u64> {
                self.engine().save(output)
            }

            fn phase(&self) -> $crate::phase::Phase {
                self.engine().phase()
            }

            fn last_decision(&self) -> Option<$crate::decision::Decision> {
                self.engine().last_decision()
            }
        }
    };
}

pub(crate) use forward_builder;
