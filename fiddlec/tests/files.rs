use std::{
    fs::{self, read_dir, File},
    io::BufReader,
    path::Path,
};

use fiddlec::{value::Value, vm::Vm};
use serde::{de::DeserializeOwned, Deserialize};

#[test]
fn run_all_scripts() {
    let dirs = read_dir("tests/scripts").expect("Failed to read directory");
    for maybe_entry in dirs {
        let entry = maybe_entry.expect("Failed to read entry");
        let name = entry.path();
        let name = name.to_str().expect("Failed to convert entry to string");
        if !name.ends_with(".fdl") {
            continue;
        }
        let base = name.trim_end_matches(".fdl");
        dbg!(name);
        let source = fs::read_to_string(name).expect("Couldn't read script");
        let expected: TestOutput = read_from_file(format!("{base}.output.json"));
        let mut vm = Vm::new();
        match vm.interpret(&source) {
            Ok(value) => {
                let want = expected.value.unwrap_or_else(|| {
                    panic!("{name}: expected error {:?}, got value {value}", expected.error)
                });
                assert!(want == value, "{name}: expected {want:?}, got {value}");
            }
            Err(error) => {
                let want = expected
                    .error
                    .unwrap_or_else(|| panic!("{name}: unexpected error: {error}"));
                assert_eq!(error.to_string(), want, "{name}");
            }
        }
    }
}

fn read_from_file<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> T {
    let file = File::open(&path).expect("Couldn't open file");
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).unwrap_or_else(|e| {
        panic!(
            "Couldn't deserialize JSON for {}, {e}",
            path.as_ref().display()
        )
    })
}

/// Expectation file: either the final value of the script or the message of
/// the error it must fail with.
#[derive(Deserialize, Debug)]
pub struct TestOutput {
    #[serde(default)]
    value: Option<TestValue>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum TestValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<TestValue>),
}

impl PartialEq<Value> for TestValue {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (TestValue::Null, Value::Null) => true,
            (TestValue::Bool(a), Value::Bool(b)) => a == b,
            (TestValue::Int(a), Value::Int(b)) => a == b,
            (TestValue::String(a), Value::String(b)) => a.as_str() == b.as_ref(),
            (TestValue::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}
