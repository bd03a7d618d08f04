mod test_mesh_room_over_socket;
