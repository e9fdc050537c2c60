use std::path::PathBuf;

use serde_json::Value;

/// Converts `KeyExchange` into `KEY_EXCHANGE`.
fn to_constant_case(name: &str) -> String {
    let mut output = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() && i != 0 {
            output.push('_');
        }
        output.push(c.to_ascii_uppercase());
    }
    output
}

fn main() {
    // Generate packet opcodes
    {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push("resources/opcodes.json");

        println!("cargo::rerun-if-changed={}", d.to_str().unwrap());

        let mut output_str = String::new();

        let opcodes_buffer = std::fs::read_to_string(d).unwrap();
        let json: Value = serde_json::from_str(&opcodes_buffer).unwrap();
        for element in json.as_object().unwrap() {
            let key = element.0;
            let opcodes = element.1.as_array().unwrap();

            // beginning
            output_str.push_str(&format!("pub mod {key} {{\n"));
            output_str.push_str("use crate::packet::Opcode;\n\n");

            for opcode in opcodes {
                let opcode = opcode.as_object().unwrap();
                let name = opcode.get("name").unwrap().as_str().unwrap();
                let kind = opcode.get("type").unwrap().as_u64().unwrap();
                let subtype = opcode.get("subtype").unwrap().as_u64().unwrap();

                output_str.push_str(&format!(
                    "pub const {}: Opcode = Opcode::new({kind:#04X}, {subtype:#04X});\n",
                    to_constant_case(name)
                ));
            }

            // names
            output_str.push_str("\n/// Returns a human-readable name of the opcode.\n");
            output_str.push_str("pub fn get_name(opcode: Opcode) -> &'static str {\n");
            output_str.push_str("match (opcode.kind, opcode.subtype) {\n");

            for opcode in opcodes {
                let opcode = opcode.as_object().unwrap();
                let name = opcode.get("name").unwrap().as_str().unwrap();
                let kind = opcode.get("type").unwrap().as_u64().unwrap();
                let subtype = opcode.get("subtype").unwrap().as_u64().unwrap();

                output_str.push_str(&format!("({kind:#04X}, {subtype:#04X}) => \"{name}\",\n"));
            }

            output_str.push_str("_ => \"Unknown\",\n");

            output_str.push_str("}\n");
            output_str.push_str("}\n");

            // end module
            output_str.push_str("}\n\n");
        }

        std::fs::write("src/opcodes.rs", output_str).expect("Failed to write opcodes file!");
    }
}
