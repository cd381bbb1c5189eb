use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};

use bulwark_db::{Database, NewOpponentDefense};
use bulwark_gateway::MemoryTransport;
use bulwark_imaging::CropAndNumber;
use bulwark_workflow::{BulkPublisher, OpponentLifecycle, PublisherConfig};

fn screenshot(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba([20, 20, 20, 255])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[tokio::test(start_paused = true)]
async fn approved_screenshots_are_cropped_numbered_and_published() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let transport = Arc::new(MemoryTransport::accepting_all());
    let opponents = OpponentLifecycle::new(db.clone(), Arc::new(CropAndNumber::default()));
    let publisher = BulkPublisher::new(
        db.clone(),
        transport.clone(),
        transport.clone(),
        PublisherConfig::default(),
    );

    let uploads: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|user| NewOpponentDefense {
            user_id: user.into(),
            username: user.into(),
            image_data: screenshot(200, 400),
            image_filename: Some("shot.png".into()),
        })
        .collect();
    opponents.submit(&uploads).unwrap();
    opponents
        .submit(&[NewOpponentDefense {
            user_id: "C".into(),
            username: "C".into(),
            image_data: b"not an image".to_vec(),
            image_filename: None,
        }])
        .unwrap();

    let report = opponents.approve_all().unwrap();
    assert_eq!(report.approved.len(), 2);
    assert_eq!(report.failed.len(), 1);

    let published = publisher.publish_opponents("out", "158").await;
    assert_eq!(published.published_count, 2);

    let images: Vec<_> = transport
        .channel_messages()
        .into_iter()
        .flat_map(|(_, m)| m.files)
        .collect();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].filename, "defense_1.png");
    assert_eq!(images[1].filename, "defense_2.png");

    let decoded = image::load_from_memory(&images[0].data).unwrap();
    assert_eq!(decoded.dimensions(), (140, 192));

    // The broken upload burned number 3 and stays pending.
    assert_eq!(db.current_opponent_number().unwrap(), 3);
    assert_eq!(opponents.pending().unwrap().len(), 1);
}
