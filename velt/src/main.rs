mod cli;
mod logger;

use anyhow::Result;
use clap::Parser;

use velt_script::{Console, IdentFlags, Value};

fn main() -> Result<()> {
    logger::init();
    let args = cli::Cli::parse();

    let mut con = Console::new();
    register_host_idents(&mut con);
    con.set_config_paths(args.scripts.first().cloned(), None);

    if args.dump {
        for path in &args.scripts {
            let src = std::fs::read_to_string(path)?;
            let code = con.compile(&src)?;
            println!("// {}", path.display());
            print!("{}", code.dump());
        }
        for chunk in &args.eval {
            let code = con.compile(chunk)?;
            print!("{}", code.dump());
        }
        return Ok(());
    }

    for path in &args.scripts {
        if let Err(e) = con.exec_file(path) {
            log::error!("{e:#}");
        }
        flush_output(&mut con);
    }

    for chunk in &args.eval {
        match con.execute(chunk) {
            Ok(v) => {
                flush_output(&mut con);
                if !v.is_null() {
                    println!("{}", v.as_str());
                }
            }
            Err(_) => flush_output(&mut con),
        }
    }

    for _ in 0..args.ticks {
        con.update(10);
        flush_output(&mut con);
    }

    if let Some(path) = &args.write_cfg {
        con.write_cfg(path)?;
        log::info!("wrote config to {}", path.display());
    }

    Ok(())
}

fn flush_output(con: &mut Console) {
    for line in con.take_output() {
        println!("{line}");
    }
}

/// A few host-side idents so configs have something real to poke at.
/// A full engine registers its whole cvar/command surface here.
fn register_host_idents(con: &mut Console) {
    con.declare_int_var("maxfps", 5, 200, 1000, IdentFlags::PERSIST, None);
    con.declare_str_var("playername", "unnamed", IdentFlags::PERSIST, None);
    // min > max: read-only.
    con.declare_int_var("version", 1, 100, 0, IdentFlags::empty(), None);

    let _ = con.declare_command("quit", "", |_, _| std::process::exit(0));
    let _ = con.declare_command("about", "", |con, _| {
        con.console_msg("velt console 0.1.0");
        Value::Null
    });
}
