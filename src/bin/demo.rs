//! Walkthrough of the allocator over a real OS page: a couple of
//! allocations, a rejected size, and the coalescing proof (32 + 64 freed
//! back-to-back must satisfy a 96-byte request).

use std::process::ExitCode;

use pagealloc::{Arena, OsProvider};

fn main() -> ExitCode {
    let mut arena = Arena::new(OsProvider);

    if let Err(err) = arena.initialize() {
        eprintln!("initialization failed: {err}");
        return ExitCode::FAILURE;
    }
    println!("arena initialized: {} free bytes", arena.free_bytes());

    let first = match arena.allocate(32) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("allocation of 32 bytes failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("allocated 32 bytes at offset {}", first.offset());

    let second = match arena.allocate(64) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("allocation of 64 bytes failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("allocated 64 bytes at offset {}", second.offset());

    // 10 is not a multiple of 8 and has to be refused.
    match arena.allocate(10) {
        Err(err) => println!("correctly refused 10 bytes: {err}"),
        Ok(_) => {
            eprintln!("a 10-byte request was accepted, it must be rejected");
            return ExitCode::FAILURE;
        }
    }

    for handle in [first, second] {
        if let Err(err) = arena.deallocate(handle) {
            eprintln!("deallocation at offset {} failed: {err}", handle.offset());
            return ExitCode::FAILURE;
        }
        println!("deallocated block at offset {}", handle.offset());
    }

    // The two freed neighbors must have merged into one run that can take
    // their combined size.
    let merged = match arena.allocate(96) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("allocation of 96 bytes after the frees failed (merge issue?): {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("allocated 96 bytes at offset {} after coalescing", merged.offset());

    if let Err(err) = arena.deallocate(merged) {
        eprintln!("final deallocation failed: {err}");
        return ExitCode::FAILURE;
    }

    if let Err(err) = arena.teardown() {
        eprintln!("teardown failed: {err}");
        return ExitCode::FAILURE;
    }
    println!("arena released, all checks passed");

    ExitCode::SUCCESS
}
