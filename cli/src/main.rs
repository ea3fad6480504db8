use std::{
    env, fs,
    io::{self, BufRead, Write},
    process,
};

use fiddlec::{error::FiddleError, vm::Vm};

/// Read blocks of lines, each terminated by a blank line, and run them
/// against one long-lived VM so definitions persist between blocks.
fn repl(vm: &mut Vm) {
    let stdin = io::stdin();
    let mut block = String::new();
    prompt();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if !line.trim().is_empty() {
            block.push_str(&line);
            block.push('\n');
            continue;
        }
        run_block(vm, &block);
        block.clear();
        prompt();
    }
    // Whatever was pending when stdin closed
    run_block(vm, &block);
}

fn prompt() {
    print!("> ");
    io::stdout().flush().unwrap();
}

fn run_block(vm: &mut Vm, source: &str) {
    if source.trim().is_empty() {
        return;
    }
    match vm.interpret(source) {
        Ok(value) => println!("{value}"),
        Err(error) => eprintln!("{error}"),
    }
}

fn run_file(vm: &mut Vm, path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            eprintln!("Unable to read file {path}: {error}");
            process::exit(74);
        }
    };
    match vm.interpret(&source) {
        Ok(value) => println!("{value}"),
        Err(error) => {
            eprintln!("{error}");
            match error {
                FiddleError::Runtime(_) => process::exit(70),
                _ => process::exit(65),
            }
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut vm = Vm::new();
    match args.len() {
        1 => repl(&mut vm),
        2 => run_file(&mut vm, &args[1]),
        _ => {
            eprintln!("Usage: fiddle [path]");
            process::exit(64);
        }
    }
}
