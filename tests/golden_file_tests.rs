// Golden File Tests for the DCPU-16 compiler
// Compiles the programs under demos/ and checks listings and run results

use std::fs;
use std::path::{Path, PathBuf};

use dcpu16c::dcpu_compiler::{CompilerConfig, DcpuCompiler};
use dcpu16c::vm::Machine;
use test_log::test;

fn project_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn compile_demo(name: &str) -> String {
    let source = fs::read_to_string(project_path(&format!("demos/{}.dcpu", name)))
        .unwrap_or_else(|err| panic!("reading demo {}: {}", name, err));
    DcpuCompiler::default()
        .compile(&source)
        .unwrap_or_else(|err| panic!("compiling demo {}: {}", name, err))
}

#[test]
fn test_countdown_matches_golden_listing() {
    let listing = compile_demo("countdown");
    let golden = fs::read_to_string(project_path("tests/golden_files/countdown.dasm")).unwrap();

    if listing.trim_end() != golden.trim_end() {
        for (i, (got, want)) in listing.lines().zip(golden.lines()).enumerate() {
            if got != want {
                log::error!("first difference at line {}: got '{}', want '{}'", i + 1, got, want);
                break;
            }
        }
        panic!("countdown listing differs from golden file");
    }
}

#[test]
fn test_countdown_runs() {
    let mut machine = Machine::assemble(&compile_demo("countdown")).unwrap();
    machine.run(10_000).unwrap();
    assert_eq!(&machine.display(0x8000)[..4], &[3, 2, 1, 0]);
}

#[test]
fn test_primes_sieve() {
    let mut machine = Machine::assemble(&compile_demo("primes")).unwrap();
    machine.run(100_000).unwrap();

    let primes: Vec<usize> = machine.display(0x8000)[..32]
        .iter()
        .enumerate()
        .filter(|(_, cell)| **cell == 1)
        .map(|(n, _)| n)
        .collect();
    assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31]);
}

#[test]
fn test_demo_config_matches_defaults() {
    let config = CompilerConfig::from_file(&project_path("demos/dcpu16c.toml")).unwrap();
    assert_eq!(config, CompilerConfig::default());
}
