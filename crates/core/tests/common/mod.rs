//! Shared test harness: assemble an inline program, run it, inspect state.

use mips_core::config::Config;
use mips_core::isa::parse_register;
use mips_core::stats::SimReport;
use mips_core::Simulator;

pub struct TestContext {
    pub sim: Simulator,
}

impl TestContext {
    /// Assembles `src` with the default configuration.
    pub fn new(src: &str) -> Self {
        Self::with_config(Config::default(), src)
    }

    /// Assembles `src` with an explicit configuration.
    pub fn with_config(config: Config, src: &str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let sim = Simulator::from_source(&config, src).expect("program assembles");
        Self { sim }
    }

    /// Runs to the exit syscall (or cycle limit) and returns the report.
    pub fn run(&mut self) -> SimReport {
        self.sim.run().expect("simulation completes")
    }

    /// Reads an architectural register by name (e.g. `"$t0"`).
    pub fn reg(&self, name: &str) -> u32 {
        let r = parse_register(name).expect("known register");
        self.sim.core.regs.read(r)
    }

    /// Reads a word of simulated memory, flushing dirty cache lines first so
    /// committed stores are visible.
    pub fn mem_word(&mut self, addr: u32) -> u32 {
        let core = &mut self.sim.core;
        core.dcache
            .flush_dirty(&mut core.mem)
            .expect("flush stays in range");
        core.mem.read_u32(addr).expect("address in range")
    }

    /// Address of a label in the assembled program.
    pub fn label(&self, name: &str) -> u32 {
        *self
            .sim
            .core
            .program
            .labels
            .get(name)
            .expect("label exists")
    }
}
