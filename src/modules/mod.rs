pub mod face_detection_client;
pub mod pose_detection_client;
