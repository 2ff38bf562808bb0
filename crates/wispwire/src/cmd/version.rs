use wispwire_frame::{FRAME_OVERHEAD, MAX_ID, MAX_PAYLOAD};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wispwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wispwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("WISPWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: conn={}, serial={}, async={}, cli=true",
        cfg!(feature = "conn"),
        cfg!(feature = "serial"),
        cfg!(feature = "async")
    );
    println!("frame: max_id={MAX_ID}, max_payload={MAX_PAYLOAD}, overhead={FRAME_OVERHEAD}, crc=crc32-ieee");

    Ok(SUCCESS)
}
