mod editor_files;
