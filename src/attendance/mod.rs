pub mod attendance_controller;
pub mod attendance_service;
pub mod dto;
