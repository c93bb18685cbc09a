use axml_patch::android::{AttributeKey, ManifestEditor, WellKnownAttribute};
use std::env;
use std::error::Error;

// Patches a single attribute of a compiled AndroidManifest.xml in place.
// Well-known names (package, versionCode, extractNativeLibs, android:allowBackup, ...) go to
// the element they belong on; anything else is treated as a raw attribute of <application>.

//Usage: patch_manifest <AndroidManifest.xml> <attribute> <value>
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <AndroidManifest.xml> <attribute> <value>", args[0]);
        std::process::exit(1);
    }

    match patch(&args[1], &args[2], &args[3]) {
        Ok(_) => println!("All done: patched {}", args[1]),
        Err(e) => eprintln!("Aborted due to error: {e}"),
    }
}

fn patch(path: &str, attribute: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let mut editor = ManifestEditor::open(path)?;
    let outcome = match WellKnownAttribute::from_name(attribute) {
        Some(known) => editor.set_well_known(known, value)?,
        None => {
            let name = attribute.strip_prefix("android:").unwrap_or(attribute);
            editor.set_attribute("application", AttributeKey::Name(name.to_string()), value)?
        }
    };
    println!("{attribute} = {value}: {outcome:?}");
    Ok(())
}
