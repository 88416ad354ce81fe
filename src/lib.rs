#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod builder;
pub mod config;
pub mod engine;
pub mod engine_headless;
pub mod instruction;
pub mod interpreter;
pub mod opcode_tables;
pub mod opcodes_actor;
pub mod opcodes_control;
pub mod opcodes_scene;
pub mod opcodes_thread;
pub mod programs;
pub mod stack;
pub mod thread;
pub mod threads;
pub mod util;
pub mod values;
pub mod vmrand;


#[cfg(test)]
mod tests {
    use crate::builder::ScriptBuilder;
    use crate::engine_headless::headless_services;
    use crate::interpreter::Interpreter;

    use log::info;
    use test_log::test;

    #[test]
    fn run_trivial_script() -> Result<(), String> {
        // push-zero / pop / terminate: the smallest well-formed script
        let mut sb = ScriptBuilder::new();
        sb.instr(176, |_| {});
        sb.instr(146, |_| {});
        sb.terminate();

        let (services, handles) = headless_services(0);
        let mut interp = Interpreter::new(services);
        interp.programs.insert(0x0002_0001, sb.build());
        interp.start_script_thread(0x0002_0001, 0, [0, 0, 0])?;
        interp.run_until_idle()?;

        info!("engine log: {:?}", handles.log.borrow());
        assert!(interp.threads.is_empty());
        Ok(())
    }
}
