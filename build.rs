use std::{env, error::Error, fs};

// Vertex buffer slots shared between the render pipeline and the WGSL source.
// Keep in sync with `particle_renderer::{QUAD_SLOT, POSITION_SIZE_SLOT, COLOR_SLOT}`.
const QUAD_SLOT: u32 = 0;
const POSITION_SIZE_SLOT: u32 = 1;
const COLOR_SLOT: u32 = 2;

// All shaders reside in the 'src/shaders' directory
fn generate_shaders() -> std::result::Result<(), Box<dyn Error>> {
    let tera = tera::Tera::new("src/shaders/*")?;
    println!("cargo:rerun-if-changed=src/shaders/");
    let mut context = tera::Context::new();
    context.insert("quad_slot", &QUAD_SLOT);
    context.insert("position_size_slot", &POSITION_SIZE_SLOT);
    context.insert("color_slot", &COLOR_SLOT);
    let output_path = env::var("OUT_DIR")?;
    fs::create_dir_all(format!("{}/shaders/", output_path))?;
    for file in fs::read_dir("src/shaders")? {
        let file = file?;
        let is_wgsl = file
            .path()
            .extension()
            .map_or(false, |extension| extension == "wgsl");
        if is_wgsl {
            let file = file.file_name();
            let file_name = file.to_str().ok_or("Non UTF-8 shader file name")?;
            let result = tera.render(file_name, &context)?;
            fs::write(format!("{}/shaders/{}", output_path, file_name), result)?;
            println!("cargo:rerun-if-changed=src/shaders/{}", file_name);
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = generate_shaders() {
        // panic here for a nicer error message, otherwise it will
        // be flattened to one line for some reason
        panic!("Unable to generate shaders\n{}", err);
    }
}
