fn main() {
    if cfg!(target_os = "macos") {
        // GStreamer.framework ships the decoders used by the video source
        println!("cargo:rustc-link-search=framework=/Library/Frameworks");
        println!(
            "cargo:rustc-link-arg=-Wl,-rpath,/Library/Frameworks/GStreamer.framework/Versions/1.0/lib"
        );
    }
    println!("cargo:rerun-if-changed=build.rs");
}
