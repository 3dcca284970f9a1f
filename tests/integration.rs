#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use cropkit::core::{CropPlan, CropperConfig, WorkflowController, WorkflowState};
    use cropkit::processors::{
        AspectRatio, HandleLedger, MetadataProcessor, PercentRect, PreservedMetadata,
        UploadedFile,
    };
    use cropkit::{collect_image_paths, run_session};
    use exif::experimental::Writer;
    use exif::{Field, In, Tag, Value};
    use image::{GenericImageView, ImageFormat, RgbImage};
    use std::io::{Cursor, Read};

    fn write_image(dir: &TempDir, name: &str, width: u32, height: u32, format: ImageFormat) {
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        dir.child(name).write_binary(buffer.get_ref()).unwrap();
    }

    fn camera_jpeg(width: u32, height: u32, make: &str) -> Vec<u8> {
        let img = RgbImage::new(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();

        let field = Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![make.as_bytes().to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&field);
        let mut blob = Cursor::new(Vec::new());
        writer.write(&mut blob, false).unwrap();

        MetadataProcessor::new()
            .inject(buffer.get_ref(), &PreservedMetadata::new(blob.into_inner()))
            .unwrap()
    }

    fn load(dir: &TempDir, names: &[&str]) -> Vec<UploadedFile> {
        names
            .iter()
            .map(|name| UploadedFile::from_path(dir.child(name).path()).unwrap())
            .collect()
    }

    fn entry(zip: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        zip.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_three_file_batch_with_one_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "A.png", 200, 100, ImageFormat::Png);
        temp_dir.child("C.jpg").write_binary(b"not an image at all").unwrap();
        temp_dir
            .child("B.jpg")
            .write_binary(&camera_jpeg(64, 48, "Acme"))
            .unwrap();

        let ledger = HandleLedger::new();
        let mut controller = WorkflowController::new(CropperConfig::default())
            .unwrap()
            .with_ledger(ledger.clone());

        let accepted = controller
            .upload(load(&temp_dir, &["A.png", "C.jpg", "B.jpg"]))
            .unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(controller.ingest_errors().len(), 1);
        assert_eq!(controller.ingest_errors()[0].file_name, "C.jpg");

        controller.select_ratio(AspectRatio::SQUARE).unwrap();
        assert_eq!(controller.current_image().unwrap().name(), "A.png");
        controller
            .complete_percent_crop(PercentRect::new(10.0, 10.0, 50.0, 50.0))
            .unwrap();
        assert_eq!(controller.current_image().unwrap().name(), "B.jpg");
        controller.complete_percent_crop(PercentRect::full()).unwrap();

        let report = controller.report().unwrap();
        assert_eq!(report.exported, 2);
        assert_eq!(report.total, 2);
        assert!(report.export_errors.is_empty());
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.title(), "Finished with some issues");
        assert!(matches!(
            controller.state(),
            WorkflowState::Done { exported: 2, errors } if errors.is_empty()
        ));

        let archive = report.archive.clone().unwrap();
        assert_eq!(archive.name, "cropped-images.zip");

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"A.jpg"));
        assert!(names.contains(&"B.jpg"));

        let a = image::load_from_memory(&entry(&mut zip, "A.jpg")).unwrap();
        assert_eq!(a.dimensions(), (100, 50));

        let b_bytes = entry(&mut zip, "B.jpg");
        assert_eq!(image::load_from_memory(&b_bytes).unwrap().dimensions(), (64, 48));
        let exif = MetadataProcessor::new().read_exif(&b_bytes).unwrap().unwrap();
        let make = exif.get_field(Tag::Make, In::PRIMARY).unwrap();
        match &make.value {
            Value::Ascii(values) => assert_eq!(values[0], b"Acme"),
            other => panic!("unexpected Make value {other:?}"),
        }

        controller.start_over().unwrap();
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_session_from_plan_file() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "wide.png", 300, 100, ImageFormat::Png);
        write_image(&temp_dir, "tall.bmp", 50, 150, ImageFormat::Bmp);

        let plan_file = temp_dir.child("plan.json");
        plan_file
            .write_str(r#"{"wide.png": {"x": 0, "y": 0, "width": 25, "height": 100}}"#)
            .unwrap();

        let mut plan = CropPlan::from_path(plan_file.path()).unwrap();
        let mut controller = WorkflowController::new(CropperConfig::default()).unwrap();

        let files = load(&temp_dir, &["wide.png", "tall.bmp"]);
        let report = run_session(&mut controller, files, AspectRatio::SQUARE, &mut plan)
            .unwrap()
            .unwrap();

        assert_eq!(report.exported, 2);
        assert_eq!(report.title(), "All Done!");

        let archive = report.archive.clone().unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();

        let wide = image::load_from_memory(&entry(&mut zip, "wide.jpg")).unwrap();
        assert_eq!(wide.dimensions(), (75, 100));

        // No plan entry: centered square covering 90% of the width.
        let tall = image::load_from_memory(&entry(&mut zip, "tall.jpg")).unwrap();
        assert_eq!(tall.dimensions(), (45, 45));
    }

    #[test]
    fn test_collect_inputs_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "b.png", 4, 4, ImageFormat::Png);
        write_image(&temp_dir, "a.png", 4, 4, ImageFormat::Png);
        temp_dir.child("readme.txt").write_str("hello").unwrap();

        let paths = collect_image_paths(&[temp_dir.path().to_path_buf()], false).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png"]);
    }

    #[test]
    fn test_oversized_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "big.png", 64, 64, ImageFormat::Png);
        write_image(&temp_dir, "small.png", 2, 2, ImageFormat::Png);

        let small_len = std::fs::metadata(temp_dir.child("small.png").path())
            .unwrap()
            .len();
        let config = CropperConfig {
            max_file_size: small_len,
            ..Default::default()
        };
        let mut controller = WorkflowController::new(config).unwrap();
        controller
            .upload(load(&temp_dir, &["big.png", "small.png"]))
            .unwrap();

        assert_eq!(controller.images().len(), 1);
        assert_eq!(controller.ingest_errors()[0].file_name, "big.png");
        assert!(controller.ingest_errors()[0]
            .message
            .starts_with("File is too large"));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heic_without_decoder_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        temp_dir.child("IMG_0001.HEIC").write_binary(&[0u8; 32]).unwrap();
        write_image(&temp_dir, "ok.png", 8, 8, ImageFormat::Png);

        let mut controller = WorkflowController::new(CropperConfig::default()).unwrap();
        controller
            .upload(load(&temp_dir, &["IMG_0001.HEIC", "ok.png"]))
            .unwrap();

        assert_eq!(controller.images().len(), 1);
        assert_eq!(controller.ingest_errors()[0].file_name, "IMG_0001.HEIC");
    }
}
