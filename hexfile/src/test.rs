use super::*;

#[test]
fn render_known_records() {
    let image = Image::from(0x0100, vec![0x0E, 0x09, 0x11, 0x0B, 0x01]);

    assert_eq!(image.to_hex(), ":050100000E09110B01C6\r\n:00000001FF\r\n");
}

#[test]
fn render_splits_long_data() {
    let image = Image::copy_from(0x0000, &[0xAA; 20]);
    let text = image.to_hex();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(":10000000"));
    assert!(lines[1].starts_with(":04001000"));
    assert_eq!(lines[2], ":00000001FF");
}

#[test]
fn every_record_sums_to_zero() {
    let image = Image::from(0x0100, (0u16..60).map(|b| b as u8).collect());

    for line in image.to_hex().lines() {
        let body = &line[1..];
        let sum = (0..body.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&body[i..i + 2], 16).unwrap())
            .fold(0u8, |a, b| a.wrapping_add(b));
        assert_eq!(sum, 0, "record {} does not checksum", line);
    }
}

#[test]
fn parse_rejects_bad_checksum() {
    assert!(parse(":0100000000FE\r\n").is_err());
}

#[test]
fn write_read() {
    let path = "test.hex";

    let image_orig = Image::from(
        0x0100,
        vec![30, 27, 34, 50, 91, 83, 49, 5, 6, 134, 61, 2, 6, 239, 34, 8, 15],
    );

    write_file(path, &image_orig).unwrap();

    let image_read = read_file(path).unwrap();

    assert_eq!(image_orig, image_read);

    std::fs::remove_file(path).unwrap();
}
