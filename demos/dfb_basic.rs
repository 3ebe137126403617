//! Example of encoding and decoding a DFB document

use emx_dfb::{Archive, Decoder, Encoder, EncoderConfig, FileEntry};

fn main() -> anyhow::Result<()> {
    println!("=== DFB V1 Example ===\n");

    let mut archive = Archive::new();

    // Text file, stored verbatim
    archive.add_entry(FileEntry::new("README.md", "# Example Archive\n\nThis is a sample file."));

    // Binary file (simulated JPEG header), stored as base64
    archive.add_entry(FileEntry::new("assets/image.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46]));

    let config = EncoderConfig::default().with_size(true).with_mime(true);
    let encoded = Encoder::new().with_config(config).encode(&archive)?;

    println!("Encoded document:");
    println!("---");
    println!("{}", encoded);
    println!("---");

    let decoded = Decoder::new().decode(&encoded)?;

    println!("\nDecoded {} files ({} errors):", decoded.archive.len(), decoded.errors.len());
    for entry in decoded.entries() {
        println!("  - {} ({} bytes, {})", entry.path, entry.content.len(), entry.encoding);
    }

    for (orig, dec) in archive.iter().zip(decoded.archive.iter()) {
        assert_eq!(orig.path, dec.path);
        assert_eq!(orig.content, dec.content);
    }

    println!("\nRound-trip verification passed!");

    Ok(())
}
