pub mod attendance_response;
