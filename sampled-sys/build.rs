use std::path::Path;

// Link against libsystemd. `SYSTEMD_LIB_DIR` (plus optionally `SYSTEMD_LIBS`,
// colon separated) bypasses pkg-config, `SYSTEMD_PKG_NAME` picks another
// pkg-config package (e.g. `libelogind`).
fn main() {
    let name = "systemd";
    let name_upper = name.to_ascii_uppercase();
    let mut be = build_env::BuildEnv::from_env().expect("cargo build environment");

    let lib_dir_var = format!("{name_upper}_LIB_DIR");
    let libs = be.var(format!("{name_upper}_LIBS"));

    let lib_dir = match be.var(&lib_dir_var) {
        Some(lib_dir) => lib_dir,
        None => {
            let pkg_var = format!("{name_upper}_PKG_NAME");
            let package = be
                .var(&pkg_var)
                .map(|v| {
                    v.into_string()
                        .unwrap_or_else(|e| panic!("{pkg_var} is not valid UTF-8: {e:?}"))
                })
                .unwrap_or_else(|| format!("lib{name}"));

            if let Err(error) = pkg_config::probe_library(&package) {
                eprintln!("pkg_config could not find {package:?}: {error}");
                std::process::exit(1);
            }
            return;
        }
    };

    assert!(
        Path::new(&lib_dir).exists(),
        "{lib_dir_var} refers to {lib_dir:?}, which does not exist"
    );
    println!(
        "cargo:rustc-link-search=native={}",
        lib_dir.to_string_lossy()
    );

    match libs.and_then(|l| l.into_string().ok()) {
        Some(libs) => {
            for lib in libs.split(':').filter(|l| !l.is_empty()) {
                println!("cargo:rustc-link-lib={lib}");
            }
        }
        None => println!("cargo:rustc-link-lib={name}"),
    }
}
