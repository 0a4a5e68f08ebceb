use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // GD32F4xx GPIO ports, 16 pins each on the 144-pin (Z) package:
    // PA..PG fully bonded, PH and PI partially, all exposed as singletons.
    let gpio_ports: &[char] = &['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

    // Generate singletons
    let mut singletons: Vec<String> = Vec::new();

    // Add GPIO pin singletons
    for port in gpio_ports {
        for pin_num in 0..16 {
            singletons.push(format!("P{}{}", port, pin_num));
        }
    }

    // Add peripheral singletons
    singletons.push("PMU".to_string());
    singletons.push("EXMC".to_string());

    // _generated.rs
    let mut g = TokenStream::new();

    let singleton_tokens: Vec<_> = singletons.iter().map(|s| format_ident!("{}", s)).collect();

    g.extend(quote! {
        crate::peripherals_definition!(#(#singleton_tokens),*);
    });

    g.extend(quote! {
        crate::peripherals_struct!(#(#singleton_tokens),*);
    });

    // _macros.rs
    let mut m = String::new();

    // Generate foreach_pin macro
    let mut pins_table: Vec<Vec<String>> = Vec::new();
    for (port_num, port) in gpio_ports.iter().enumerate() {
        for pin_num in 0..16 {
            let pin_name = format!("P{}{}", port, pin_num);
            pins_table.push(vec![
                pin_name,
                format!("GPIO{}", port),
                port_num.to_string(),
                pin_num.to_string(),
            ]);
        }
    }

    make_table(&mut m, "foreach_pin", &pins_table);

    // Write generated files
    let out_file = out_dir.join("_generated.rs").to_string_lossy().to_string();
    fs::write(out_file, g.to_string()).unwrap();

    let out_file = out_dir.join("_macros.rs").to_string_lossy().to_string();
    fs::write(out_file, m).unwrap();

    // cortex-m-rt's link.x INCLUDEs memory.x from the linker search path
    fs::write(out_dir.join("memory.x"), include_str!("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=memory.x");
}

fn make_table(out: &mut String, name: &str, data: &Vec<Vec<String>>) {
    write!(
        out,
        "#[allow(unused)]
macro_rules! {} {{
    ($($pat:tt => $code:tt;)*) => {{
        macro_rules! __{}_inner {{
            $(($pat) => $code;)*
            ($_:tt) => {{}}
        }}
",
        name, name
    )
    .unwrap();

    for row in data {
        writeln!(out, "        __{}_inner!(({}));", name, row.join(",")).unwrap();
    }

    write!(
        out,
        "    }};
}}"
    )
    .unwrap();
}
